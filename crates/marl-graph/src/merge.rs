//! Sibling-partition merging.
//!
//! After splitting, many partitions iterate the same mesh entities and
//! could share one loop. This pass builds a meta-graph (one node per
//! partition, edges for inter-partition dependencies), enumerates the
//! pairs that may legally fuse, works out which merges rule out which
//! others, and greedily applies the least-obstructive merges first.

use indexmap::{IndexMap, IndexSet};

use marl_core::NodeId;

use crate::graph::Graph;
use crate::subgraph::Subgraph;

/// Counters from one merge pass.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MergeOutcome {
    pub(crate) candidates: usize,
    pub(crate) applied: usize,
    pub(crate) cancelled: usize,
}

/// Whether two meta-nodes (partitions) may fuse: distinct, same region,
/// mergeable loop categories, and neither transitively depends on the
/// other (fusing an ordered pair would put a loop before its own inputs).
fn can_merge(meta: &Graph, a: NodeId, b: NodeId) -> bool {
    if a == b {
        return false;
    }
    let (ta, tb) = (meta.loop_type(a), meta.loop_type(b));
    if !ta.category.mergeable_with(tb.category) {
        return false;
    }
    if ta.region != tb.region {
        return false;
    }
    if meta.depends_on(a, b) || meta.depends_on(b, a) {
        return false;
    }
    true
}

/// Fuse compatible sibling partitions in place.
///
/// Merged partitions accumulate through a representative table, so chains
/// of pairwise merges collapse into a single subgraph; emptied partitions
/// are removed at the end. On return no remaining pair satisfies
/// [`can_merge`].
pub(crate) fn merge_siblings(g: &Graph, partitions: &mut Vec<Subgraph>) -> MergeOutcome {
    if partitions.len() < 2 {
        return MergeOutcome::default();
    }

    // Meta-graph: node i stands for partitions[i]. A partition's loop
    // type is uniform by construction, so the first member's type serves.
    let mut meta = Graph::new();
    let mut node_to_meta: IndexMap<NodeId, NodeId> = IndexMap::new();
    for (i, part) in partitions.iter().enumerate() {
        let loop_type = part
            .first()
            .map(|n| g.loop_type(n))
            .unwrap_or_default();
        let m = meta.create(&format!("loop{i}"), false, false, loop_type);
        for n in part.nodes() {
            // A node duplicated into several partitions keeps only its
            // last mapping; the dropped mappings can hide a meta-edge,
            // which makes the pass conservative, never unsound.
            node_to_meta.insert(n, m);
        }
    }

    // Inter-partition dependency edges. Duplicated uncached nodes can
    // make two partitions appear to need each other; an edge that would
    // close a meta-cycle is skipped (the pair stays unmergeable through
    // the depends_on checks that already link them).
    for part in partitions.iter() {
        for n in part.nodes() {
            for &d in g.deps(n) {
                let (mn, md) = (node_to_meta[&n], node_to_meta[&d]);
                if mn == md {
                    continue;
                }
                let _ = meta.needs(mn, md);
            }
        }
    }
    meta.prepare();

    // Candidate pairs.
    let metas: Vec<NodeId> = meta.node_ids().collect();
    let mut candidates: Vec<(NodeId, NodeId)> = Vec::new();
    for i in 0..metas.len() {
        for j in (i + 1)..metas.len() {
            if can_merge(&meta, metas[i], metas[j]) {
                candidates.push((metas[i], metas[j]));
            }
        }
    }

    // Which other candidates each candidate invalidates. Merging (L1, L2)
    // invalidates (O1, O2) when the fused pair would sit both above and
    // below the other fused pair in the dependency order — i.e. applying
    // both merges would close a cycle between the two fused loops — or
    // when the candidates share a node whose partner pair is ordered.
    let mut cancellations: Vec<Vec<usize>> = vec![Vec::new(); candidates.len()];
    for i in 0..candidates.len() {
        let (loop1, loop2) = candidates[i];
        for j in (i + 1)..candidates.len() {
            let (mut other1, mut other2) = candidates[j];

            // orient the other pair so other1 lines up with loop1
            if loop1 == other2
                || meta.depends_on(loop1, other2)
                || meta.depends_on(other2, loop1)
            {
                std::mem::swap(&mut other1, &mut other2);
            }

            let conflict = (meta.depends_on(loop1, other1) && meta.depends_on(other2, loop2))
                || (meta.depends_on(other1, loop1) && meta.depends_on(loop2, other2))
                || (loop1 == other1
                    && (meta.depends_on(loop2, other2) || meta.depends_on(other2, loop2)))
                || (loop2 == other2
                    && (meta.depends_on(loop1, other1) || meta.depends_on(other1, loop1)));
            if conflict {
                cancellations[i].push(j);
                cancellations[j].push(i);
            }
        }
    }

    // Fewest-cancellations first (stable), remapping the cancellation
    // indices into sorted positions.
    let mut indices: Vec<usize> = (0..candidates.len()).collect();
    indices.sort_by_key(|&i| cancellations[i].len());
    let mut position = vec![0usize; candidates.len()];
    for (pos, &old) in indices.iter().enumerate() {
        position[old] = pos;
    }
    let sorted_merges: Vec<(NodeId, NodeId)> =
        indices.iter().map(|&i| candidates[i]).collect();
    let sorted_cancellations: Vec<Vec<usize>> = indices
        .iter()
        .map(|&i| cancellations[i].iter().map(|&j| position[j]).collect())
        .collect();

    // Greedy selection: take each surviving candidate, cancel its set.
    let mut cancelled: IndexSet<usize> = IndexSet::new();
    let mut chosen: Vec<usize> = Vec::new();
    for i in 0..sorted_merges.len() {
        if cancelled.contains(&i) {
            continue;
        }
        chosen.push(i);
        for &c in &sorted_cancellations[i] {
            cancelled.insert(c);
        }
    }

    // Apply through a representative table: earlier merges may already
    // have unified the two partitions through an intermediate.
    let mut reps: Vec<usize> = (0..partitions.len()).collect();
    for &mi in &chosen {
        let (m1, m2) = sorted_merges[mi];
        // meta node index == original partition index, by construction
        let (r1, r2) = (reps[m1.index()], reps[m2.index()]);
        if r1 == r2 {
            continue;
        }
        let mut moved = std::mem::take(&mut partitions[r2]);
        partitions[r1].merge_from(&mut moved);
        for r in reps.iter_mut() {
            if *r == r2 {
                *r = r1;
            }
        }
    }
    partitions.retain(|p| !p.is_empty());

    MergeOutcome {
        candidates: candidates.len(),
        applied: chosen.len(),
        cancelled: cancelled.len(),
    }
}
