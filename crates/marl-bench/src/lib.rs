//! Benchmark-only crate; see the `benches/` directory.
//!
//! Holds no library code of its own — it exists so the criterion
//! benchmarks get a dedicated dependency set without weighing down the
//! library crates.
