//! The Marl value store.
//!
//! A [`ValueStore`] maps names to typed, on-demand producers of mesh
//! quantities ([`Valuer`]s) and serves three generations of history
//! (current, old, older) keyed by [`Location`](marl_core::Location).
//! Evaluation is pull-based: a valuer asked for its value may pull its own
//! dependencies through the store, forming a synchronous call tree. The
//! store enforces the ordering, typing, and history contracts along the
//! way — cycle detection, runtime type checks, automatic staging of
//! current values for the next shift, and initial-value fallbacks.
//!
//! A store is a strictly single-threaded structure: re-entrant pulls go
//! through `&self` with interior mutability, so it is deliberately not
//! `Sync`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod history;
pub mod persist;
mod store;
mod valuer;

pub use store::{MapperFn, StoreConfig, ValueStore};
pub use valuer::Valuer;
