//! Schedule explorer — solve a generated dependency system and inspect
//! the result.
//!
//! Demonstrates:
//!   1. Generating a layered random system with a fixed seed
//!   2. Solving with and without sibling merging, comparing stats
//!   3. Filtering partitions to the ones a chosen output actually needs
//!   4. Emitting Graphviz dot text for the filtered schedule
//!
//! Run with:
//!   cargo run --example schedule_explorer

use marl::graph::{compute_loops, compute_partitions_with_stats, dot, Graph, Subgraph};
use marl::prelude::*;
use marl_test_utils::{GraphGen, GraphSpec};

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

fn main() {
    let gen = GraphGen {
        layers: 5,
        width: 6,
        edge_prob: 0.2,
        ..GraphGen::default()
    };
    let g = build(&gen.generate(2024));
    println!("system: {} nodes", g.len());

    // 1. Solve both ways and compare.
    let (plain, plain_stats) = compute_partitions_with_stats(&g, false);
    let (merged, merged_stats) = compute_partitions_with_stats(&g, true);
    println!(
        "unmerged: {} partitions over {} loop indices",
        plain.len(),
        plain_stats.loop_count
    );
    println!(
        "merged:   {} partitions ({} candidates, {} applied, {} cancelled)",
        merged.len(),
        merged_stats.merge_candidates,
        merged_stats.merges_applied,
        merged_stats.merges_cancelled
    );

    // 2. Pick the first top-layer leaf as "the output" and keep only the
    //    partitions its evaluation actually reaches.
    let output = g
        .leaves()
        .first()
        .copied()
        .expect("a DAG always has a leaf");
    let reached: Vec<Subgraph> = merged
        .iter()
        .filter(|p| p.reachable_from(&g, &[output]))
        .cloned()
        .collect();
    println!(
        "output '{}' touches {} of {} partitions",
        g.name(output),
        reached.len(),
        merged.len()
    );

    // 3. The ordered schedule for the touched partitions.
    let loops = compute_loops(&g, &reached);
    print!("{}", dot::format_loops(&g, &loops));

    // 4. Dot text for offline rendering.
    println!("{}", dot::dot_graph_merged(&g, &reached));
}
