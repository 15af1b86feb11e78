//! Property tests over generated dependency graphs: coverage, loop
//! monotonicity, type purity, and ordering soundness hold for every
//! admissible DAG, not just the hand-built scenarios.

use indexmap::IndexSet;
use marl_core::{LoopType, NodeId};
use marl_graph::{compute_loops, compute_partitions, Graph};
use marl_test_utils::{GraphGen, GraphSpec};
use proptest::prelude::*;

fn build(spec: &GraphSpec) -> Graph {
    let mut g = Graph::new();
    let ids: Vec<NodeId> = spec
        .nodes
        .iter()
        .map(|n| {
            g.create(
                &n.name,
                n.cached,
                n.reducing,
                LoopType::new(n.category, n.region),
            )
        })
        .collect();
    for &(a, b) in &spec.edges {
        g.needs(ids[a], ids[b]).unwrap();
    }
    g
}

fn generated(seed: u64) -> Graph {
    build(&GraphGen::default().generate(seed))
}

proptest! {
    #[test]
    fn every_node_lands_in_a_partition(seed in 0u64..64, merge in any::<bool>()) {
        let g = generated(seed);
        let partitions = compute_partitions(&g, merge);
        for n in g.node_ids() {
            prop_assert!(
                partitions.iter().any(|p| p.contains(n)),
                "node {} missing from every partition", g.name(n)
            );
        }
    }

    #[test]
    fn partition_dependencies_are_local_or_cached(seed in 0u64..64, merge in any::<bool>()) {
        let g = generated(seed);
        let partitions = compute_partitions(&g, merge);
        for p in &partitions {
            for n in p.nodes() {
                for &d in g.deps(n) {
                    prop_assert!(
                        p.contains(d) || g.is_cached(d),
                        "dependency {} of {} is neither in-partition nor cached",
                        g.name(d), g.name(n)
                    );
                }
            }
        }
    }

    #[test]
    fn loop_numbers_are_monotonic_along_edges(seed in 0u64..64) {
        let g = generated(seed);
        g.prepare();
        for n in g.node_ids() {
            for &d in g.deps(n) {
                prop_assert!(g.loop_number(d) >= g.loop_number(n));
                if g.loop_type(d) != g.loop_type(n) || g.is_reducing(d) {
                    prop_assert!(g.loop_number(d) > g.loop_number(n));
                }
            }
        }
    }

    #[test]
    fn unmerged_partitions_have_one_loop_type(seed in 0u64..64) {
        let g = generated(seed);
        let partitions = compute_partitions(&g, false);
        for p in &partitions {
            let types: IndexSet<LoopType> = p.nodes().map(|n| g.loop_type(n)).collect();
            prop_assert_eq!(types.len(), 1);
        }
    }

    #[test]
    fn merged_partitions_stay_region_pure_and_family_mergeable(seed in 0u64..64) {
        let g = generated(seed);
        let partitions = compute_partitions(&g, true);
        for p in &partitions {
            let types: Vec<LoopType> = p.nodes().map(|n| g.loop_type(n)).collect();
            for pair in types.windows(2) {
                prop_assert_eq!(pair[0].region, pair[1].region);
                prop_assert!(pair[0].category.mergeable_with(pair[1].category));
            }
        }
    }

    #[test]
    fn ordering_covers_each_partition_and_respects_edges(seed in 0u64..64, merge in any::<bool>()) {
        let g = generated(seed);
        let partitions = compute_partitions(&g, merge);
        let loops = compute_loops(&g, &partitions);
        prop_assert_eq!(loops.len(), partitions.len());

        // loops come out reversed relative to the partition list
        for (groups, p) in loops.iter().rev().zip(partitions.iter()) {
            let emitted: IndexSet<NodeId> = groups.iter().flatten().copied().collect();
            let members: IndexSet<NodeId> = p.nodes().collect();
            prop_assert_eq!(&emitted, &members);

            // no node appears twice, and in-partition dependencies are
            // emitted in a strictly earlier group
            let flat_count: usize = groups.iter().map(Vec::len).sum();
            prop_assert_eq!(flat_count, emitted.len());
            let position = |n: NodeId| groups.iter().position(|grp| grp.contains(&n));
            for n in p.nodes() {
                for &d in g.deps(n) {
                    if p.contains(d) {
                        prop_assert!(position(d).unwrap() < position(n).unwrap());
                    }
                }
            }
        }
    }

    #[test]
    fn solving_is_deterministic(seed in 0u64..32) {
        let spec = GraphGen::default().generate(seed);
        let g1 = build(&spec);
        let g2 = build(&spec);
        let p1 = compute_partitions(&g1, true);
        let p2 = compute_partitions(&g2, true);
        let names = |g: &Graph, ps: &[marl_graph::Subgraph]| -> Vec<Vec<String>> {
            ps.iter()
                .map(|p| p.nodes().map(|n| g.name(n).to_string()).collect())
                .collect()
        };
        prop_assert_eq!(names(&g1, &p1), names(&g2, &p2));
    }
}
