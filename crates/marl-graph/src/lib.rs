//! Dependency graph and loop partitioner for the Marl value runtime.
//!
//! A [`Graph`] holds one node per schedulable quantity, tagged with
//! `{cached, reducing, loop type}` and connected by `needs` edges. The
//! partitioner turns the graph into a minimal set of mesh loops:
//!
//! 1. group nodes by loop number (how deep in the dependency hierarchy a
//!    value must be computed),
//! 2. split each group by loop type,
//! 3. split into connected components,
//! 4. pull every uncached dependency into each loop that re-executes it,
//! 5. optionally fuse sibling loops that can legally share an iteration,
//! 6. topologically order each loop into groups of concurrently runnable
//!    nodes.
//!
//! [`compute_partitions`] runs stages 1–5, [`compute_loops`] runs stage 6,
//! and [`dot`] renders any of it for Graphviz.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod dot;
mod graph;
mod merge;
mod order;
mod partition;
mod subgraph;

pub use builder::{BuilderError, GraphBuilder};
pub use graph::Graph;
pub use order::compute_loops;
pub use partition::{compute_partitions, compute_partitions_with_stats, SolveStats};
pub use subgraph::Subgraph;
