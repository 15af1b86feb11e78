//! Core types for the Marl finite-element value runtime.
//!
//! This is the leaf crate with zero internal Marl dependencies. It defines
//! the fundamental abstractions used throughout the Marl workspace:
//! identifiers, mesh evaluation locations, the loop taxonomy, shared error
//! types, and the type-erased value layer the store keeps its history in.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod id;
pub mod location;
pub mod looptype;
pub mod value;

// Re-export core types at crate root for convenience.
pub use error::{GraphError, PersistError, StoreError};
pub use id::{NodeId, PartitionId, RegionId, ValueId};
pub use location::{CustomKey, Location};
pub use looptype::{LoopCategory, LoopType};
pub use value::{StoredValue, Value};
