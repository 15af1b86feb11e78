//! Marl: a finite-element value runtime.
//!
//! Marl solves one problem: computing many interdependent, spatially
//! located quantities on a mesh in the correct order, only where needed,
//! and with stateful history. Two subsystems carry the weight:
//!
//! - the **value store** ([`store::ValueStore`]) — a typed, on-demand
//!   evaluator and history cache for named quantities computed at mesh
//!   [`Location`](types::Location)s, with implicit dependency discovery,
//!   cycle detection, old/older history, and adaptivity projection;
//! - the **dependency partitioner** ([`graph::Graph`] +
//!   [`graph::compute_partitions`]) — turns a graph of quantities tagged
//!   `{cached, reducing, loop type}` into a minimal schedule of mesh
//!   loops, duplicating uncached work where it must re-run and fusing
//!   sibling loops that can share an iteration.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Marl sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use marl::prelude::*;
//!
//! // Register two quantities; "flux" pulls "conductivity" on demand.
//! let mut store = ValueStore::with_config(StoreConfig { errcheck: true });
//! store.add("conductivity", ConstValuer::new(45.0)).unwrap();
//! let k = store.id("conductivity").unwrap();
//! store
//!     .add("flux", LambdaValuer::new(move |store: &ValueStore, loc: &Location| {
//!         Ok(-store.get::<f64>(k, loc)? * 2.0)
//!     }))
//!     .unwrap();
//!
//! let loc = Location::new(1, 0, 4);
//! assert_eq!(store.get_named::<f64>("flux", &loc).unwrap(), -90.0);
//!
//! // History: stage, shift, read back.
//! assert_eq!(store.get_old_named::<f64>("flux", &loc).unwrap(), 0.0);
//! store.shift();
//! assert_eq!(store.get_old_named::<f64>("flux", &loc).unwrap(), -90.0);
//!
//! // Schedule a two-quantity graph into mesh loops.
//! let mut graph = Graph::new();
//! let residual = graph.create("residual", false, false, LoopType::default());
//! let average = graph.create("average", true, true, LoopType::default());
//! graph.needs(residual, average).unwrap();
//! let partitions = compute_partitions(&graph, true);
//! let loops = compute_loops(&graph, &partitions);
//! assert_eq!(loops.len(), 2); // the reduction runs a loop earlier
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `marl-core` | IDs, locations, loop taxonomy, errors, value erasure |
//! | [`store`] | `marl-store` | The value store, valuer trait, history persistence |
//! | [`valuers`] | `marl-valuers` | Lambda/const/shared-slot valuers, region umbrellas |
//! | [`graph`] | `marl-graph` | Dependency graph, partitioner, ordering, dot output |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types: identifiers, locations, loop taxonomy, errors (`marl-core`).
pub use marl_core as types;

/// The value store and valuer trait (`marl-store`).
pub use marl_store as store;

/// Reference valuers (`marl-valuers`).
pub use marl_valuers as valuers;

/// Dependency graph and partitioner (`marl-graph`).
pub use marl_graph as graph;

/// Common imports for typical Marl usage.
///
/// ```rust
/// use marl::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use marl_core::{
        CustomKey, Location, LoopCategory, LoopType, NodeId, PartitionId, RegionId, Value,
        ValueId,
    };

    // Errors
    pub use marl_core::{GraphError, PersistError, StoreError};

    // Store
    pub use marl_store::{StoreConfig, ValueStore, Valuer};

    // Valuers
    pub use marl_valuers::{ConstValuer, LambdaValuer, LambdaVarValuer, SharedSlot, Umbrella};

    // Graph / partitioner
    pub use marl_graph::{
        compute_loops, compute_partitions, compute_partitions_with_stats, Graph, SolveStats,
        Subgraph,
    };
}
