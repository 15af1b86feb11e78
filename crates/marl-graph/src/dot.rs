//! Graphviz emission and loop pretty-printing for diagnostics.

use std::fmt::Write as _;

use marl_core::NodeId;

use crate::graph::Graph;
use crate::subgraph::Subgraph;

/// Label text for one node as seen from one partition: name, partition
/// tag, loop type, and cached/reducing decoration.
fn node_label(g: &Graph, part: &Subgraph, n: NodeId) -> String {
    let mut label = format!(
        "{} on partition {}\\n{}",
        g.name(n),
        part.id(),
        g.loop_type(n)
    );
    if g.is_cached(n) {
        label.push_str("\\n(cached");
        if g.is_reducing(n) {
            label.push_str(",reducing");
        }
        label.push(')');
    }
    label
}

/// One edge line from `src` to `dst`, or an island line when `dst` is
/// absent. A target outside the partition is filled khaki: it marks a
/// cached value computed in an earlier loop that this loop only reads.
fn dot_edge(g: &Graph, part: &Subgraph, src: NodeId, dst: Option<NodeId>) -> String {
    match dst {
        Some(dst) if part.contains(dst) => {
            format!(
                "\"{}\" -> \"{}\";\n",
                node_label(g, part, src),
                node_label(g, part, dst)
            )
        }
        Some(dst) => {
            let dst_label = format!("\"{}\"", node_label(g, part, dst));
            format!(
                "\"{}\" -> {dst_label};\n{dst_label} [style=filled, fillcolor=khaki];\n",
                node_label(g, part, src)
            )
        }
        None => format!("\"{}\";\n", node_label(g, part, src)),
    }
}

fn dot_connections(g: &Graph, part: &Subgraph) -> String {
    let mut out = String::new();
    for n in part.nodes() {
        let mut island = true;
        for &dep in g.deps(n) {
            island = false;
            out.push_str(&dot_edge(g, part, n, Some(dep)));
        }
        if g.dependers(n).iter().any(|d| part.contains(*d)) {
            island = false;
        }
        if island {
            out.push_str(&dot_edge(g, part, n, None));
        }
    }
    out
}

/// Render one subgraph as a Graphviz digraph.
pub fn dot_graph(g: &Graph, part: &Subgraph) -> String {
    format!("digraph g {{\n{}}}\n", dot_connections(g, part))
}

/// Render several subgraphs into a single digraph, one cluster each.
pub fn dot_graph_merged(g: &Graph, parts: &[Subgraph]) -> String {
    let mut out = String::from("digraph g {\n");
    for (i, part) in parts.iter().enumerate() {
        let _ = write!(out, "subgraph g{} {{\n{}}}\n", i + 1, dot_connections(g, part));
    }
    out.push_str("}\n");
    out
}

/// Render a computed loop ordering as indented text.
///
/// The loop-type header is taken from the first node of each loop; loops
/// fused across the elemental family print whichever member category
/// came first.
pub fn format_loops(g: &Graph, loops: &[Vec<Vec<NodeId>>]) -> String {
    let mut out = String::new();
    for (i, groups) in loops.iter().enumerate() {
        let header = groups
            .first()
            .and_then(|grp| grp.first())
            .map(|&n| g.loop_type(n).to_string())
            .unwrap_or_default();
        let _ = writeln!(out, "loop {} ({header}):", i + 1);
        for (j, group) in groups.iter().enumerate() {
            let names: Vec<&str> = group.iter().map(|&n| g.name(n)).collect();
            let _ = writeln!(out, "    group {}: {}", j + 1, names.join(", "));
        }
    }
    out
}
