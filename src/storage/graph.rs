//! The call graph (4.E): an `N x N` sparse boolean adjacency matrix and its
//! transpose, stored as a hand-rolled CSR-like structure.
//!
//! No dependency in this crate's tree provides sparse boolean adjacency
//! (no `petgraph`, no numeric crate), and the one hot operation the
//! detector (4.G) needs — "rows reachable from source <= K" — only needs
//! row slicing, which a plain `(row_offsets, col_indices)` pair gives
//! directly. `G` and its transpose `G^T` are always built together from
//! the same edge list so the transpose-consistency invariant (spec.md §8)
//! holds by construction rather than by separate maintenance.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::types::UnitId;

/// A sparse `N x N` boolean adjacency matrix in compressed-row form.
/// `col_indices[row_offsets[i]..row_offsets[i+1]]` are the sorted,
/// deduplicated out-neighbors of row `i`.
#[derive(Debug, Clone, Default)]
pub struct SparseGraph {
    num_units: usize,
    row_offsets: Vec<u32>,
    col_indices: Vec<u32>,
}

impl SparseGraph {
    /// Build from an unsorted, possibly-duplicated edge list.
    pub fn from_triples(num_units: usize, edges: &[(u32, u32)]) -> Self {
        let mut sorted: Vec<(u32, u32)> = edges.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut row_offsets = vec![0u32; num_units + 1];
        for &(row, _) in &sorted {
            row_offsets[row as usize + 1] += 1;
        }
        for i in 0..num_units {
            row_offsets[i + 1] += row_offsets[i];
        }
        let col_indices = sorted.into_iter().map(|(_, col)| col).collect();

        Self {
            num_units,
            row_offsets,
            col_indices,
        }
    }

    /// The transpose: an edge `(u, v)` in `self` becomes `(v, u)` here.
    pub fn transpose(&self) -> Self {
        let edges: Vec<(u32, u32)> = self.to_triples().into_iter().map(|(r, c)| (c, r)).collect();
        Self::from_triples(self.num_units, &edges)
    }

    pub fn num_units(&self) -> usize {
        self.num_units
    }

    pub fn num_edges(&self) -> usize {
        self.col_indices.len()
    }

    /// Out-neighbors of `row`, sorted ascending.
    pub fn row(&self, row: u32) -> &[u32] {
        let start = self.row_offsets[row as usize] as usize;
        let end = self.row_offsets[row as usize + 1] as usize;
        &self.col_indices[start..end]
    }

    pub fn has_edge(&self, row: u32, col: u32) -> bool {
        self.row(row).binary_search(&col).is_ok()
    }

    pub fn to_triples(&self) -> Vec<(u32, u32)> {
        let mut out = Vec::with_capacity(self.col_indices.len());
        for row in 0..self.num_units {
            for &col in self.row(row as u32) {
                out.push((row as u32, col));
            }
        }
        out
    }

    /// Single-source bounded-distance search from `source`, following
    /// out-edges of this graph. Framed as a binary-heap Dijkstra (uniform
    /// edge weight 1) rather than plain BFS, per spec.md §9's note that
    /// "the code path must still accept larger K" even though the default
    /// `limit` of 1 makes BFS and Dijkstra equivalent today.
    ///
    /// Returns the set of vertices reachable within `limit` hops
    /// (including `source` itself, at distance 0) and a predecessor map
    /// for path reconstruction. `source` has no predecessor entry — it is
    /// the implicit root.
    pub fn bounded_search(&self, source: UnitId, limit: u32) -> BoundedSearch {
        let mut dist: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();
        let mut predecessors: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();
        let mut heap: BinaryHeap<Reverse<(u32, u32)>> = BinaryHeap::new();

        let source = source.value();
        dist.insert(source, 0);
        heap.push(Reverse((0, source)));

        while let Some(Reverse((d, node))) = heap.pop() {
            if d > dist.get(&node).copied().unwrap_or(u32::MAX) {
                continue;
            }
            if d >= limit {
                continue;
            }
            for &neighbor in self.row(node) {
                let next_dist = d + 1;
                if next_dist <= limit && next_dist < dist.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    dist.insert(neighbor, next_dist);
                    predecessors.insert(neighbor, node);
                    heap.push(Reverse((next_dist, neighbor)));
                }
            }
        }

        BoundedSearch {
            source: UnitId::new(source),
            reachable: dist.keys().map(|&id| UnitId::new(id)).collect(),
            predecessors,
        }
    }
}

/// The result of `SparseGraph::bounded_search`.
#[derive(Debug, Clone)]
pub struct BoundedSearch {
    pub source: UnitId,
    pub reachable: std::collections::HashSet<UnitId>,
    /// `predecessors[v]` is the next vertex on the shortest path back to
    /// `source`, for every reachable `v != source`.
    predecessors: std::collections::HashMap<u32, u32>,
}

impl BoundedSearch {
    /// Reconstruct `source -> ... -> target` by walking predecessors
    /// backwards from `target`, bounded at `max_len + 1` vertices to
    /// defend against a malformed predecessor map (spec.md §9). Returns
    /// `None` if `target` is unreachable or the walk exceeds the bound
    /// without reaching `source`.
    pub fn path_to(&self, target: UnitId, max_len: u32) -> Option<Vec<UnitId>> {
        if target == self.source {
            return Some(vec![self.source]);
        }
        let mut reversed = vec![target];
        let mut current = target.value();
        for _ in 0..=max_len {
            if current == self.source.value() {
                break;
            }
            current = *self.predecessors.get(&current)?;
            reversed.push(UnitId::new(current));
            if current == self.source.value() {
                break;
            }
        }
        if *reversed.last().unwrap() != self.source {
            return None;
        }
        reversed.reverse();
        Some(reversed)
    }
}

/// `G` and `G^T` built together from the same edge list, guaranteeing the
/// transpose-consistency invariant by construction.
#[derive(Debug, Clone)]
pub struct GraphPair {
    pub call_graph: SparseGraph,
    pub called_by_graph: SparseGraph,
}

impl GraphPair {
    pub fn from_edges(num_units: usize, edges: &[(u32, u32)]) -> Self {
        let call_graph = SparseGraph::from_triples(num_units, edges);
        let called_by_graph = call_graph.transpose();
        Self {
            call_graph,
            called_by_graph,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_is_consistent() {
        let g = SparseGraph::from_triples(3, &[(0, 1), (0, 2), (1, 2)]);
        let gt = g.transpose();
        for i in 0u32..3 {
            for j in 0u32..3 {
                assert_eq!(g.has_edge(i, j), gt.has_edge(j, i));
            }
        }
    }

    #[test]
    fn dedups_duplicate_edges() {
        let g = SparseGraph::from_triples(2, &[(0, 1), (0, 1), (0, 1)]);
        assert_eq!(g.num_edges(), 1);
    }

    #[test]
    fn bounded_search_respects_limit() {
        // 0 -> 1 -> 2 -> 3
        let g = SparseGraph::from_triples(4, &[(0, 1), (1, 2), (2, 3)]);
        let search = g.bounded_search(UnitId::new(0), 1);
        assert!(search.reachable.contains(&UnitId::new(0)));
        assert!(search.reachable.contains(&UnitId::new(1)));
        assert!(!search.reachable.contains(&UnitId::new(2)));
    }

    #[test]
    fn path_to_reconstructs_shortest_path() {
        let g = SparseGraph::from_triples(3, &[(0, 1), (1, 2)]);
        let search = g.bounded_search(UnitId::new(0), 2);
        let path = search.path_to(UnitId::new(2), 2).unwrap();
        assert_eq!(path, vec![UnitId::new(0), UnitId::new(1), UnitId::new(2)]);
    }

    #[test]
    fn path_to_unreachable_target_is_none() {
        let g = SparseGraph::from_triples(3, &[(0, 1)]);
        let search = g.bounded_search(UnitId::new(0), 1);
        assert!(search.path_to(UnitId::new(2), 1).is_none());
    }

    #[test]
    fn graph_pair_keeps_transpose_in_sync() {
        let pair = GraphPair::from_edges(3, &[(0, 1), (2, 1)]);
        assert!(pair.call_graph.has_edge(0, 1));
        assert!(pair.called_by_graph.has_edge(1, 0));
        assert!(pair.called_by_graph.has_edge(1, 2));
    }
}
