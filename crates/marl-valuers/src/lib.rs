//! Reference valuers for the Marl value store.
//!
//! These cover the common registration patterns so drivers rarely write a
//! [`Valuer`](marl_store::Valuer) by hand:
//!
//! - [`LambdaValuer`] — wraps a pure closure `Location -> T`.
//! - [`ConstValuer`] — a fixed value with the `"constant"` guarantee.
//! - [`LambdaVarValuer`] — wraps a procedure that fills one or more
//!   [`SharedSlot`]s per location, re-running only when the location
//!   changes. The bundle pattern for material-style multi-output
//!   computations.
//! - [`Umbrella`] — registers a mapper that routes one name to per-region
//!   sub-values.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod lambda;
mod umbrella;

pub use lambda::{shared_slot, ConstValuer, LambdaValuer, LambdaVarValuer, SharedSlot};
pub use umbrella::Umbrella;
