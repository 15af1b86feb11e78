//! Partition solving: loop grouping, splitting, and dependency flooding.

use std::collections::BTreeMap;

use indexmap::IndexSet;

use marl_core::{LoopType, NodeId};

use crate::graph::Graph;
use crate::merge::merge_siblings;
use crate::subgraph::Subgraph;

/// Counters describing one partition solve.
///
/// Populated by [`compute_partitions_with_stats`]; useful for telemetry
/// and for asserting solver behavior in tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolveStats {
    /// Number of distinct loop indices (`max loop + 1`).
    pub loop_count: usize,
    /// Partitions after the per-loop split by loop type.
    pub partitions_after_type_split: usize,
    /// Partitions after splitting into connected components.
    pub partitions_after_component_split: usize,
    /// Sibling pairs that satisfied `can_merge`.
    pub merge_candidates: usize,
    /// Merges actually performed.
    pub merges_applied: usize,
    /// Candidates discarded because a chosen merge invalidated them.
    pub merges_cancelled: usize,
}

/// Partition the graph into mesh loops.
///
/// Runs the full pipeline: group by loop number, split by loop type,
/// split into connected components, flood uncached dependencies into
/// every consumer partition, and (when `merge` is set) fuse compatible
/// sibling partitions. Every node lands in at least one partition;
/// uncached nodes may land in several — they are re-executed wherever
/// they are needed.
pub fn compute_partitions(g: &Graph, merge: bool) -> Vec<Subgraph> {
    compute_partitions_with_stats(g, merge).0
}

/// [`compute_partitions`] plus the solve counters.
pub fn compute_partitions_with_stats(g: &Graph, merge: bool) -> (Vec<Subgraph>, SolveStats) {
    g.prepare();
    let mut stats = SolveStats::default();

    if g.is_empty() {
        return (Vec::new(), stats);
    }

    // 1. one subgraph per loop index; a node's loop number is the deepest
    //    loop any consumer needs it in
    let mut max_loop = 0;
    for n in g.roots() {
        max_loop = max_loop.max(g.loop_number(n));
    }
    let mut loop_graphs: Vec<Subgraph> = (0..=max_loop).map(|_| Subgraph::new()).collect();
    for n in g.node_ids() {
        loop_graphs[g.loop_number(n) as usize].add(n);
    }
    stats.loop_count = loop_graphs.len();

    // 2. split each loop by loop type; BTreeMap keying keeps the
    //    partition order deterministic
    let mut partitions: Vec<Subgraph> = Vec::new();
    for lg in &loop_graphs {
        let mut by_type: BTreeMap<LoopType, Subgraph> = BTreeMap::new();
        for n in lg.nodes() {
            by_type
                .entry(g.loop_type(n))
                .or_insert_with(Subgraph::new)
                .add(n);
        }
        partitions.extend(by_type.into_values());
    }
    stats.partitions_after_type_split = partitions.len();

    // 3. split into connected components before flooding: shared uncached
    //    dependencies pulled in below would otherwise glue unrelated work
    //    together and hide merge opportunities
    partitions = split_components(g, partitions);
    stats.partitions_after_component_split = partitions.len();

    // 4. pull uncached dependencies into every partition that consumes
    //    them; cached producers from earlier loops are referenced, not
    //    re-executed
    for p in &mut partitions {
        for leaf in p.leaves(g) {
            flood_up(g, leaf, p, g.loop_type(leaf), g.loop_number(leaf));
        }
    }

    debug_assert!(covers_all_dependencies(g, &partitions));

    // 5. sibling merge
    if merge {
        let outcome = merge_siblings(g, &mut partitions);
        stats.merge_candidates = outcome.candidates;
        stats.merges_applied = outcome.applied;
        stats.merges_cancelled = outcome.cancelled;
    }

    (partitions, stats)
}

/// Split every partition into its connected components, flooding over
/// both edge directions restricted to the partition.
fn split_components(g: &Graph, partitions: Vec<Subgraph>) -> Vec<Subgraph> {
    let mut out = Vec::new();
    for p in partitions {
        let mut remaining: IndexSet<NodeId> = p.nodes().collect();
        while let Some(&seed) = remaining.first() {
            let mut component = Subgraph::new();
            let mut stack = vec![seed];
            while let Some(n) = stack.pop() {
                if !remaining.shift_remove(&n) {
                    continue;
                }
                component.add(n);
                for &d in g.deps(n) {
                    if remaining.contains(&d) {
                        stack.push(d);
                    }
                }
                for &d in g.dependers(n) {
                    if remaining.contains(&d) {
                        stack.push(d);
                    }
                }
            }
            out.push(component);
        }
    }
    out
}

/// Walk `n`'s dependencies, adding every node of loop type `t` that must
/// execute inside the current loop: uncached nodes always (they are
/// recomputed wherever needed), cached nodes only when their own loop is
/// not later than `curr_loop`. Nodes of other loop types, and cached
/// nodes from earlier loops, stop the walk — they are references, not
/// work.
fn flood_up(g: &Graph, n: NodeId, p: &mut Subgraph, t: LoopType, curr_loop: u32) {
    let mut visited: IndexSet<NodeId> = IndexSet::new();
    let mut stack = vec![n];
    while let Some(n) = stack.pop() {
        if !visited.insert(n) {
            continue;
        }
        if g.loop_type(n) != t {
            continue;
        }
        if g.is_cached(n) && g.loop_number(n) > curr_loop {
            continue;
        }
        p.add(n);
        stack.extend(g.deps(n).iter().copied());
    }
}

/// Every dependency of every partitioned node is itself in some
/// partition (solver post-condition, debug builds only).
fn covers_all_dependencies(g: &Graph, partitions: &[Subgraph]) -> bool {
    let mut all_nodes: IndexSet<NodeId> = IndexSet::new();
    let mut all_deps: IndexSet<NodeId> = IndexSet::new();
    for p in partitions {
        for n in p.nodes() {
            all_nodes.insert(n);
            all_deps.extend(g.deps(n).iter().copied());
        }
    }
    all_deps.iter().all(|d| all_nodes.contains(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use marl_core::{LoopCategory, LoopType};

    fn elemental() -> LoopType {
        LoopType::default()
    }

    fn nodal() -> LoopType {
        LoopType::of(LoopCategory::Nodal)
    }

    fn partition_names(g: &Graph, partitions: &[Subgraph]) -> Vec<Vec<String>> {
        partitions
            .iter()
            .map(|p| {
                let mut names: Vec<String> =
                    p.nodes().map(|n| g.name(n).to_string()).collect();
                names.sort();
                names
            })
            .collect()
    }

    #[test]
    fn empty_graph_yields_no_partitions() {
        let g = Graph::new();
        let (partitions, stats) = compute_partitions_with_stats(&g, true);
        assert!(partitions.is_empty());
        assert_eq!(stats, SolveStats::default());
    }

    #[test]
    fn single_uniform_component_is_one_partition() {
        let mut g = Graph::new();
        let a = g.create("a", false, false, elemental());
        let b = g.create("b", false, false, elemental());
        let c = g.create("c", false, false, elemental());
        g.needs(a, b).unwrap();
        g.needs(a, c).unwrap();

        let partitions = compute_partitions(&g, false);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].len(), 3);
    }

    #[test]
    fn reducing_dependency_splits_off_an_earlier_loop() {
        // a -> b(reducing) -> c -> d: b, c, d execute in the earlier
        // loop; a runs later against the cached b
        let mut g = Graph::new();
        let a = g.create("a", false, false, elemental());
        let b = g.create("b", true, true, elemental());
        let c = g.create("c", false, false, elemental());
        let d = g.create("d", false, false, elemental());
        g.needs(a, b).unwrap();
        g.needs(b, c).unwrap();
        g.needs(c, d).unwrap();

        let (partitions, stats) = compute_partitions_with_stats(&g, false);
        assert_eq!(
            partition_names(&g, &partitions),
            vec![vec!["a"], vec!["b", "c", "d"]]
        );
        assert_eq!(stats.loop_count, 2);
    }

    #[test]
    fn uncached_shared_dependency_is_duplicated() {
        // two consumers in different loops share an uncached material:
        // the material must be re-executed in both partitions
        let mut g = Graph::new();
        let kernel = g.create("kernel", false, false, elemental());
        let pp = g.create("pp", true, true, elemental());
        let mat = g.create("mat", false, false, elemental());
        g.needs(kernel, pp).unwrap();
        g.needs(kernel, mat).unwrap();
        g.needs(pp, mat).unwrap();

        let partitions = compute_partitions(&g, false);
        let with_mat = partitions
            .iter()
            .filter(|p| p.contains(mat))
            .count();
        assert_eq!(with_mat, 2, "uncached mat must appear in both loops");
    }

    #[test]
    fn cached_dependency_is_not_duplicated() {
        let mut g = Graph::new();
        let kernel = g.create("kernel", false, false, elemental());
        let pp = g.create("pp", true, true, elemental());
        let aux = g.create("aux", true, false, elemental());
        g.needs(kernel, pp).unwrap();
        g.needs(kernel, aux).unwrap();
        g.needs(pp, aux).unwrap();

        let partitions = compute_partitions(&g, false);
        let with_aux = partitions.iter().filter(|p| p.contains(aux)).count();
        // aux is cached in the deepest loop that needs it and referenced
        // from the later one
        assert_eq!(with_aux, 1);
    }

    #[test]
    fn type_split_separates_nodal_from_elemental() {
        let mut g = Graph::new();
        let k = g.create("k", false, false, elemental());
        let n = g.create("n", false, false, nodal());
        let _ = (k, n);

        let partitions = compute_partitions(&g, false);
        assert_eq!(partitions.len(), 2);
        for p in &partitions {
            let mut cats: Vec<_> = p.nodes().map(|x| g.loop_type(x).category).collect();
            cats.dedup();
            assert_eq!(cats.len(), 1, "partitions never mix loop types");
        }
    }

    #[test]
    fn unconnected_work_splits_apart() {
        let mut g = Graph::new();
        let a = g.create("a", false, false, elemental());
        let b = g.create("b", false, false, elemental());
        let c = g.create("c", false, false, elemental());
        let d = g.create("d", false, false, elemental());
        g.needs(a, b).unwrap();
        g.needs(c, d).unwrap();

        let partitions = compute_partitions(&g, false);
        assert_eq!(
            partition_names(&g, &partitions),
            vec![vec!["a", "b"], vec!["c", "d"]]
        );
    }

    #[test]
    fn every_node_is_partitioned() {
        let mut g = Graph::new();
        let mut nodes = Vec::new();
        for i in 0..8 {
            let cached = i % 3 == 0;
            let reducing = i % 4 == 0;
            let lt = if i % 2 == 0 { elemental() } else { nodal() };
            nodes.push(g.create(&format!("n{i}"), cached, reducing, lt));
        }
        for i in 1..nodes.len() {
            g.needs(nodes[i - 1], nodes[i]).unwrap();
        }

        for merge in [false, true] {
            let partitions = compute_partitions(&g, merge);
            for &n in &nodes {
                assert!(
                    partitions.iter().any(|p| p.contains(n)),
                    "node {n} missing from all partitions"
                );
            }
        }
    }
}
