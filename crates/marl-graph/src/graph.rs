//! The dependency graph: node arena, edge maintenance, loop numbers.

use std::cell::Cell;

use indexmap::IndexSet;

use marl_core::{GraphError, LoopType, NodeId};

/// One schedulable quantity.
///
/// Attributes are fixed at creation; only the edge sets change, and only
/// through [`Graph::needs`].
struct NodeData {
    name: String,
    cached: bool,
    reducing: bool,
    loop_type: LoopType,
    /// What this node needs.
    deps: IndexSet<NodeId>,
    /// What needs this node.
    dependers: IndexSet<NodeId>,
    /// Every node that depends on this one, directly or transitively.
    /// Maintained incrementally by `needs`; backs the O(1) `depends_on`.
    transitive_dependers: IndexSet<NodeId>,
    /// Memoized loop number; -1 when unset.
    loop_memo: Cell<i64>,
    /// Traversal dedup marker for the incremental depender propagation.
    visit_epoch: Cell<u64>,
}

/// A dependency graph of named quantities.
///
/// The graph owns its nodes and hands out dense [`NodeId`]s. Edges never
/// form cycles: `needs` rejects both self-edges and edges that would close
/// one, which keeps `depends_on` a constant-time set lookup — the property
/// the sibling-merge phase leans on.
pub struct Graph {
    nodes: Vec<NodeData>,
    epoch: Cell<u64>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// An empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            epoch: Cell::new(0),
        }
    }

    /// Create a node. `cached` nodes keep their computed values across
    /// consecutive loops; `reducing` nodes aggregate over a whole loop
    /// (and are implicitly cached).
    pub fn create(
        &mut self,
        name: &str,
        cached: bool,
        reducing: bool,
        loop_type: LoopType,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            name: name.to_string(),
            cached,
            reducing,
            loop_type,
            deps: IndexSet::new(),
            dependers: IndexSet::new(),
            transitive_dependers: IndexSet::new(),
            loop_memo: Cell::new(-1),
            visit_epoch: Cell::new(0),
        });
        id
    }

    // ── Node attributes ────────────────────────────────────────────

    /// The node's name.
    pub fn name(&self, n: NodeId) -> &str {
        &self.nodes[n.index()].name
    }

    /// Whether the node's value survives across loops. Reducing nodes
    /// are always cached.
    pub fn is_cached(&self, n: NodeId) -> bool {
        let node = &self.nodes[n.index()];
        node.cached || node.reducing
    }

    /// Whether the node aggregates over a full loop.
    pub fn is_reducing(&self, n: NodeId) -> bool {
        self.nodes[n.index()].reducing
    }

    /// The node's loop type.
    pub fn loop_type(&self, n: NodeId) -> LoopType {
        self.nodes[n.index()].loop_type
    }

    /// What `n` needs.
    pub fn deps(&self, n: NodeId) -> &IndexSet<NodeId> {
        &self.nodes[n.index()].deps
    }

    /// What needs `n`.
    pub fn dependers(&self, n: NodeId) -> &IndexSet<NodeId> {
        &self.nodes[n.index()].dependers
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Nodes with no dependencies.
    pub fn roots(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|n| self.nodes[n.index()].deps.is_empty())
            .collect()
    }

    /// Nodes nothing depends on.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|n| self.nodes[n.index()].dependers.is_empty())
            .collect()
    }

    // ── Edges ──────────────────────────────────────────────────────

    /// Declare that `a` needs `b`.
    ///
    /// Rejects self-edges and edges that would close a cycle; a repeated
    /// edge is a no-op. On success the transitive-depender sets of `b`
    /// and everything upstream of it absorb `a` and `a`'s own transitive
    /// dependers, deduplicated by an epoch counter so each node is
    /// touched once per insertion.
    pub fn needs(&mut self, a: NodeId, b: NodeId) -> Result<(), GraphError> {
        if a == b {
            return Err(GraphError::SelfDependency {
                name: self.nodes[a.index()].name.clone(),
            });
        }
        if self.nodes[a.index()].transitive_dependers.contains(&b) {
            return Err(GraphError::DependencyCycle {
                from: self.nodes[a.index()].name.clone(),
                to: self.nodes[b.index()].name.clone(),
            });
        }
        if !self.nodes[a.index()].deps.insert(b) {
            return Ok(());
        }
        self.nodes[b.index()].dependers.insert(a);

        let mut inherited: Vec<NodeId> = self.nodes[a.index()]
            .transitive_dependers
            .iter()
            .copied()
            .collect();
        inherited.push(a);

        let epoch = self.epoch.get() + 1;
        self.epoch.set(epoch);
        let mut stack = vec![b];
        while let Some(n) = stack.pop() {
            let node = &mut self.nodes[n.index()];
            if node.visit_epoch.get() == epoch {
                continue;
            }
            node.visit_epoch.set(epoch);
            node.transitive_dependers.extend(inherited.iter().copied());
            stack.extend(node.deps.iter().copied());
        }
        Ok(())
    }

    /// Declare several dependencies of `a` at once.
    pub fn needs_all(&mut self, a: NodeId, deps: &[NodeId]) -> Result<(), GraphError> {
        for &b in deps {
            self.needs(a, b)?;
        }
        Ok(())
    }

    /// Whether `x` depends on `n`, directly or transitively. O(1).
    pub fn depends_on(&self, x: NodeId, n: NodeId) -> bool {
        self.nodes[n.index()].transitive_dependers.contains(&x)
    }

    /// Every node that depends on `n`, directly or transitively.
    pub fn transitive_dependers(&self, n: NodeId) -> &IndexSet<NodeId> {
        &self.nodes[n.index()].transitive_dependers
    }

    /// Every node `n` depends on, directly or transitively.
    ///
    /// Computed by walking the dependency edges; diagnostic use only —
    /// the hot path is the precomputed reverse direction.
    pub fn transitive_deps(&self, n: NodeId) -> IndexSet<NodeId> {
        let mut all = IndexSet::new();
        let mut stack: Vec<NodeId> = self.nodes[n.index()].deps.iter().copied().collect();
        while let Some(d) = stack.pop() {
            if all.insert(d) {
                stack.extend(self.nodes[d.index()].deps.iter().copied());
            }
        }
        all
    }

    // ── Loop numbers ───────────────────────────────────────────────

    /// The loop index this node is evaluated in.
    ///
    /// Zero for nodes nothing depends on; otherwise the maximum over all
    /// dependers `d` of `loop(d)`, plus one when the depender sits in a
    /// different loop type or this node is reducing (its result only
    /// exists after a full loop, so consumers must wait for the next
    /// one). Memoized; [`prepare`](Self::prepare) resets the memos.
    pub fn loop_number(&self, n: NodeId) -> u32 {
        let memo = self.nodes[n.index()].loop_memo.get();
        if memo >= 0 {
            return memo as u32;
        }
        let node = &self.nodes[n.index()];
        let mut max = 0;
        for &d in &node.dependers {
            let dep_loop = self.loop_number(d);
            let bump =
                u32::from(self.nodes[d.index()].loop_type != node.loop_type || node.reducing);
            max = max.max(dep_loop + bump);
        }
        self.nodes[n.index()].loop_memo.set(i64::from(max));
        max
    }

    /// Reset loop-number memos and pre-walk from the roots.
    ///
    /// Called by the partitioner before each solve so edge insertions
    /// since the last run cannot leave stale numbers behind.
    pub fn prepare(&self) {
        for node in &self.nodes {
            node.loop_memo.set(-1);
        }
        for n in self.node_ids() {
            if self.nodes[n.index()].deps.is_empty() {
                self.loop_number(n);
            }
        }
    }
}
