//! Seeded random dependency-graph descriptions for property tests.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use marl_core::{LoopCategory, RegionId};

/// One node of a generated graph.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub name: String,
    pub cached: bool,
    pub reducing: bool,
    pub category: LoopCategory,
    pub region: RegionId,
}

/// A generated dependency graph, as data.
///
/// `edges[(a, b)]` means node `a` needs node `b` (indices into `nodes`).
/// Edges only point from earlier layers to later ones, so the graph is
/// acyclic by construction and every edge insertion succeeds.
#[derive(Clone, Debug)]
pub struct GraphSpec {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<(usize, usize)>,
}

/// Layered random DAG generator with a fixed seed.
///
/// Nodes are laid out in `layers` rows of `width`; each node draws its
/// attributes and then depends on a random subset of the nodes in deeper
/// layers. The same seed always produces the same spec.
#[derive(Clone, Debug)]
pub struct GraphGen {
    pub layers: usize,
    pub width: usize,
    /// Probability of an edge between a node and each deeper candidate.
    pub edge_prob: f64,
    pub cached_prob: f64,
    pub reducing_prob: f64,
    pub categories: Vec<LoopCategory>,
    pub regions: Vec<RegionId>,
}

impl Default for GraphGen {
    fn default() -> Self {
        Self {
            layers: 4,
            width: 4,
            edge_prob: 0.3,
            cached_prob: 0.4,
            reducing_prob: 0.2,
            categories: vec![
                LoopCategory::ElementalOnElement,
                LoopCategory::ElementalOnBoundary,
                LoopCategory::Nodal,
                LoopCategory::Face,
            ],
            regions: vec![0, 1],
        }
    }
}

impl GraphGen {
    /// Generate a graph description from `seed`.
    pub fn generate(&self, seed: u64) -> GraphSpec {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut nodes = Vec::with_capacity(self.layers * self.width);
        for layer in 0..self.layers {
            for slot in 0..self.width {
                let reducing = rng.gen_bool(self.reducing_prob);
                let cached = reducing || rng.gen_bool(self.cached_prob);
                let category = self.categories[rng.gen_range(0..self.categories.len())];
                let region = self.regions[rng.gen_range(0..self.regions.len())];
                nodes.push(NodeSpec {
                    name: format!("n{layer}_{slot}"),
                    cached,
                    reducing,
                    category,
                    region,
                });
            }
        }

        let mut edges = Vec::new();
        for a in 0..nodes.len() {
            let layer_a = a / self.width;
            // candidates live strictly deeper, keeping the DAG layered
            let first_deeper = (layer_a + 1) * self.width;
            for b in first_deeper..nodes.len() {
                if !rng.gen_bool(self.edge_prob) {
                    continue;
                }
                // admissibility: a dependency in another loop type must
                // be cached, otherwise its value cannot reach the
                // consumer's loop
                let same_type = nodes[a].category == nodes[b].category
                    && nodes[a].region == nodes[b].region;
                if same_type || nodes[b].cached {
                    edges.push((a, b));
                }
            }
        }
        GraphSpec { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let gen = GraphGen::default();
        let a = gen.generate(7);
        let b = gen.generate(7);
        assert_eq!(a.nodes.len(), b.nodes.len());
        assert_eq!(a.edges, b.edges);
        for (x, y) in a.nodes.iter().zip(&b.nodes) {
            assert_eq!(x.name, y.name);
            assert_eq!(x.cached, y.cached);
            assert_eq!(x.reducing, y.reducing);
            assert_eq!(x.category, y.category);
            assert_eq!(x.region, y.region);
        }
    }

    #[test]
    fn seeds_differ() {
        let gen = GraphGen::default();
        let a = gen.generate(1);
        let b = gen.generate(2);
        assert_ne!(a.edges, b.edges);
    }

    #[test]
    fn edges_point_strictly_deeper() {
        let gen = GraphGen {
            layers: 5,
            width: 3,
            edge_prob: 0.5,
            ..GraphGen::default()
        };
        let spec = gen.generate(11);
        for &(a, b) in &spec.edges {
            assert!(b / gen.width > a / gen.width, "edge {a}->{b} not layered");
        }
    }

    #[test]
    fn reducing_nodes_are_cached() {
        let spec = GraphGen::default().generate(3);
        for node in &spec.nodes {
            if node.reducing {
                assert!(node.cached);
            }
        }
    }
}
