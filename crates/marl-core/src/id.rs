//! Strongly-typed identifiers used across the workspace.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Mesh subdomain (block or boundary) identifier.
pub type RegionId = u32;

/// Identifies a registered value within one [`ValueStore`].
///
/// Values are assigned sequential IDs at registration and never reused.
/// `ValueId(n)` is the n-th registration in its store; IDs from one store
/// are meaningless in another.
///
/// [`ValueStore`]: https://docs.rs/marl-store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    /// The ID as a plain index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ValueId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a node within one dependency graph.
///
/// Nodes are assigned sequential IDs by the graph that creates them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The ID as a plain index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Counter for unique [`PartitionId`] allocation.
static PARTITION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a partition (subgraph).
///
/// Allocated from a monotonic atomic counter via [`PartitionId::next`].
/// Partitions created in any order, by any solve, always get distinct IDs,
/// so dot output and diagnostics can distinguish subgraphs that hold the
/// same nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(u64);

impl PartitionId {
    /// Allocate a fresh, unique partition ID.
    ///
    /// Each call returns an ID never returned before within this process.
    /// Thread-safe.
    pub fn next() -> Self {
        Self(PARTITION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_id_display_and_index() {
        let id = ValueId(7);
        assert_eq!(id.to_string(), "7");
        assert_eq!(id.index(), 7);
        assert_eq!(ValueId::from(7u32), id);
    }

    #[test]
    fn partition_ids_are_unique() {
        let a = PartitionId::next();
        let b = PartitionId::next();
        assert_ne!(a, b);
    }
}
