//! Node-set views over a graph: the partition currency.

use indexmap::IndexSet;

use marl_core::{NodeId, PartitionId};

use crate::graph::Graph;

/// A set of graph nodes plus a unique tag.
///
/// Partitions, loop groups, and diagnostic selections are all subgraphs.
/// A subgraph holds membership only — edges stay on the [`Graph`] — so
/// root/leaf queries take the graph as an argument and filter edges to
/// in-set nodes.
#[derive(Clone, Debug)]
pub struct Subgraph {
    id: PartitionId,
    nodes: IndexSet<NodeId>,
}

impl Default for Subgraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Subgraph {
    /// An empty subgraph with a fresh tag.
    pub fn new() -> Self {
        Self {
            id: PartitionId::next(),
            nodes: IndexSet::new(),
        }
    }

    /// A subgraph over the given nodes.
    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            id: PartitionId::next(),
            nodes: nodes.into_iter().collect(),
        }
    }

    /// A subgraph containing every node of `g`.
    pub fn whole(g: &Graph) -> Self {
        Self::from_nodes(g.node_ids())
    }

    /// The subgraph's unique tag.
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Insert a node; re-inserting is a no-op.
    pub fn add(&mut self, n: NodeId) {
        self.nodes.insert(n);
    }

    /// Remove a node if present.
    pub fn remove(&mut self, n: NodeId) {
        self.nodes.shift_remove(&n);
    }

    /// Membership test.
    pub fn contains(&self, n: NodeId) -> bool {
        self.nodes.contains(&n)
    }

    /// The member nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// The first member, if any.
    pub fn first(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the subgraph has no members.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Members none of whose dependencies are in this subgraph.
    pub fn roots(&self, g: &Graph) -> Vec<NodeId> {
        self.nodes()
            .filter(|&n| !g.deps(n).iter().any(|d| self.contains(*d)))
            .collect()
    }

    /// Members none of whose dependers are in this subgraph.
    pub fn leaves(&self, g: &Graph) -> Vec<NodeId> {
        self.nodes()
            .filter(|&n| !g.dependers(n).iter().any(|d| self.contains(*d)))
            .collect()
    }

    /// Move every member of `other` into `self`, leaving `other` empty.
    pub fn merge_from(&mut self, other: &mut Subgraph) {
        for n in other.nodes.drain(..) {
            self.nodes.insert(n);
        }
    }

    /// Whether any member is reachable by walking dependencies downward
    /// from `from` (inclusive).
    pub fn reachable_from(&self, g: &Graph, from: &[NodeId]) -> bool {
        let mut stack: Vec<NodeId> = from.to_vec();
        let mut seen: IndexSet<NodeId> = IndexSet::new();
        while let Some(n) = stack.pop() {
            if !seen.insert(n) {
                continue;
            }
            if self.contains(n) {
                return true;
            }
            stack.extend(g.deps(n).iter().copied());
        }
        false
    }
}
