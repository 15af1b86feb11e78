//! Topological ordering of partitions into concurrency groups.

use indexmap::IndexSet;
use smallvec::SmallVec;

use marl_core::NodeId;

use crate::graph::Graph;
use crate::subgraph::Subgraph;

/// Order one partition into groups of nodes with no mutual ordering
/// constraints.
///
/// Repeatedly strips the partition's roots: each stripped set becomes one
/// group whose members an external driver may evaluate concurrently. A
/// cached root that was already emitted in an earlier group is dropped
/// instead of re-emitted — it is a reference, not work.
pub(crate) fn exec_order(g: &Graph, partition: &Subgraph) -> Vec<Vec<NodeId>> {
    let mut work = partition.clone();
    let mut executed: IndexSet<NodeId> = IndexSet::new();
    let mut order: Vec<Vec<NodeId>> = Vec::new();
    while !work.is_empty() {
        let roots: SmallVec<[NodeId; 8]> = work.roots(g).into();
        let mut group: Vec<NodeId> = Vec::with_capacity(roots.len());
        for n in roots {
            work.remove(n);
            if executed.contains(&n) && g.is_cached(n) {
                continue;
            }
            executed.insert(n);
            group.push(n);
        }
        if !group.is_empty() {
            order.push(group);
        }
    }
    order
}

/// Order every partition and arrange the loops for execution.
///
/// Output shape: loops, then groups within a loop, then nodes within a
/// group. The outer sequence is reversed from the partition list so the
/// most-deeply-depended-upon loop (the highest loop index) runs first —
/// its cached results must exist before later loops reference them.
pub fn compute_loops(g: &Graph, partitions: &[Subgraph]) -> Vec<Vec<Vec<NodeId>>> {
    let mut loops: Vec<Vec<Vec<NodeId>>> =
        partitions.iter().map(|p| exec_order(g, p)).collect();
    loops.reverse();
    loops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::compute_partitions;
    use marl_core::LoopType;

    #[test]
    fn groups_respect_dependencies() {
        // a needs b and c; b needs d; c needs d
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", false, false, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        let d = g.create("d", false, false, LoopType::default());
        g.needs_all(a, &[b, c]).unwrap();
        g.needs(b, d).unwrap();
        g.needs(c, d).unwrap();

        let part = Subgraph::from_nodes([a, b, c, d]);
        let order = exec_order(&g, &part);
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], vec![d]);
        // b and c have no mutual constraint: one concurrent group
        let mut mid = order[1].clone();
        mid.sort();
        assert_eq!(mid, vec![b, c]);
        assert_eq!(order[2], vec![a]);
    }

    #[test]
    fn emitted_position_follows_dependency_order() {
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", false, false, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(b, c).unwrap();

        let part = Subgraph::from_nodes([a, b, c]);
        let order = exec_order(&g, &part);
        let position = |n: NodeId| order.iter().position(|grp| grp.contains(&n)).unwrap();
        assert!(position(c) < position(b));
        assert!(position(b) < position(a));
    }

    #[test]
    fn deepest_loop_is_emitted_first() {
        // a -> b(reducing) -> c: two loops; the b/c loop must run first
        let mut g = Graph::new();
        let a = g.create("a", false, false, LoopType::default());
        let b = g.create("b", true, true, LoopType::default());
        let c = g.create("c", false, false, LoopType::default());
        g.needs(a, b).unwrap();
        g.needs(b, c).unwrap();

        let partitions = compute_partitions(&g, false);
        let loops = compute_loops(&g, &partitions);
        assert_eq!(loops.len(), 2);
        assert!(loops[0].iter().flatten().any(|&n| n == b));
        assert!(loops[1].iter().flatten().any(|&n| n == a));

        // loop indices strictly decrease along the emitted order
        let loop_of = |l: &Vec<Vec<NodeId>>| g.loop_number(l[0][0]);
        assert!(loop_of(&loops[0]) > loop_of(&loops[1]));
    }

    #[test]
    fn empty_partition_list_orders_to_nothing() {
        let g = Graph::new();
        assert!(compute_loops(&g, &[]).is_empty());
    }
}
