//! Test utilities for Marl development.
//!
//! Instrumented valuers for exercising the store's history and dispatch
//! contracts, and a seeded random graph generator for partitioner
//! property tests. The generator emits a plain [`GraphSpec`] description
//! rather than a built graph, so it carries no dependency on the graph
//! crate.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod fixtures;
mod graphgen;

pub use fixtures::{CountingValuer, RecordingValuer, StepValuer};
pub use graphgen::{GraphGen, GraphSpec, NodeSpec};
