// Trunkline: a VLAN service broker over composite switch/aggregator fabrics
// Copyright (C) 2026  The Trunkline Authors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Graph library
//!
//! An undirected weighted multigraph `G = (V, E, w, c)`, generic over the
//! vertex key `V`, with an additive cost `w: E -> f64` and a capacity
//! `c: E -> f64`. Backed by [`petgraph::graph::UnGraph`] so that parallel
//! edges (several trunks between the same pair of inferior networks) are
//! represented natively rather than collapsed.
//!
//! Three operations are exposed, matching the planner's needs exactly:
//! [`Graph::shortest_paths`], [`Graph::minimum_spanning_tree`], and
//! [`Graph::goal_set_spanning_tree`] (the Steiner-tree 2-approximation).
//! All three break ties deterministically using [`edge_order`], so that two
//! runs over the same topology always produce the same plan.

use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

use itertools::Itertools;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::error::Error;

/// Per-edge attributes: an additive cost and a bidirectional capacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeWeight {
    /// Additive routing cost (e.g. trunk delay).
    pub cost: f64,
    /// Remaining capacity available on this edge, in both directions.
    pub capacity: f64,
}

/// The total order used to break ties deterministically: lowest cost first,
/// then highest remaining capacity, then lowest [`EdgeIndex`]. Matches
/// §4.1's "ties broken deterministically by a supplied total order on
/// edges" and §4.5's "tie-break favours the trunk with the most remaining
/// capacity, then lowest trunk id" (trunk id and `EdgeIndex` coincide one
/// to one in the planning graph the aggregator builds).
fn edge_order(a: &EdgeWeight, a_idx: EdgeIndex, b: &EdgeWeight, b_idx: EdgeIndex) -> std::cmp::Ordering {
    a.cost
        .partial_cmp(&b.cost)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(b.capacity.partial_cmp(&a.capacity).unwrap_or(std::cmp::Ordering::Equal))
        .then(a_idx.index().cmp(&b_idx.index()))
}

/// A weighted, undirected multigraph over vertex keys `V`.
pub struct Graph<V: Eq + Hash + Copy + Ord> {
    index_of: HashMap<V, NodeIndex>,
    vertex_of: HashMap<NodeIndex, V>,
    inner: UnGraph<(), EdgeWeight>,
}

/// Result of a shortest-paths computation from a single source.
pub struct ShortestPaths<V: Eq + Hash + Copy + Ord> {
    /// Total cost to reach each (reachable) vertex.
    pub distance: HashMap<V, f64>,
    /// The edge used to reach each (reachable, non-source) vertex, and the
    /// vertex on the other end of that edge (its predecessor).
    pub predecessor: HashMap<V, (EdgeIndex, V)>,
}

impl<V: Eq + Hash + Copy + Ord> ShortestPaths<V> {
    /// Reconstructs the path of edges from the source to `target`, nearest
    /// edge last. Returns `None` if `target` is unreachable.
    pub fn path_edges(&self, target: V) -> Option<Vec<EdgeIndex>> {
        if !self.distance.contains_key(&target) {
            return None;
        }
        let mut edges = Vec::new();
        let mut cur = target;
        while let Some((edge, prev)) = self.predecessor.get(&cur) {
            edges.push(*edge);
            cur = *prev;
        }
        edges.reverse();
        Some(edges)
    }
}

impl<V: Eq + Hash + Copy + Ord> Default for Graph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Eq + Hash + Copy + Ord> Graph<V> {
    /// Builds an empty graph.
    pub fn new() -> Self {
        Self {
            index_of: HashMap::new(),
            vertex_of: HashMap::new(),
            inner: UnGraph::new_undirected(),
        }
    }

    /// Ensures `v` is present as a vertex, returning its internal index.
    pub fn add_vertex(&mut self, v: V) -> NodeIndex {
        if let Some(idx) = self.index_of.get(&v) {
            return *idx;
        }
        let idx = self.inner.add_node(());
        self.index_of.insert(v, idx);
        self.vertex_of.insert(idx, v);
        idx
    }

    /// Adds a new edge between `a` and `b`. Parallel edges between the same
    /// pair of vertices are retained distinctly (a multigraph).
    pub fn add_edge(&mut self, a: V, b: V, weight: EdgeWeight) -> EdgeIndex {
        let ai = self.add_vertex(a);
        let bi = self.add_vertex(b);
        self.inner.add_edge(ai, bi, weight)
    }

    /// Iterates over all vertices, in a stable (sorted) order.
    pub fn vertices(&self) -> Vec<V> {
        let mut vs: Vec<V> = self.index_of.keys().copied().collect();
        vs.sort();
        vs
    }

    /// The endpoints and weight of a given edge.
    pub fn edge_endpoints(&self, edge: EdgeIndex) -> Option<(V, V, EdgeWeight)> {
        let (a, b) = self.inner.edge_endpoints(edge)?;
        let weight = *self.inner.edge_weight(edge)?;
        Some((self.vertex_of[&a], self.vertex_of[&b], weight))
    }

    /// Builds the induced subgraph containing only edges with capacity `>= min_capacity`.
    /// Vertices with no remaining edge are still kept as isolated vertices.
    fn filter_by_capacity(&self, min_capacity: f64) -> Self {
        let mut g = Self::new();
        for v in self.vertices() {
            g.add_vertex(v);
        }
        for edge in self.inner.edge_references() {
            if edge.weight().capacity >= min_capacity {
                let a = self.vertex_of[&edge.source()];
                let b = self.vertex_of[&edge.target()];
                g.add_edge(a, b, *edge.weight());
            }
        }
        g
    }

    /// Distance-vector shortest paths from `source`: iterative relaxation
    /// until no distance improves. Disconnected vertices are simply absent
    /// from the result (§4.1 "treats disconnected vertices as unreachable").
    pub fn shortest_paths(&self, source: V) -> ShortestPaths<V> {
        let mut distance: HashMap<V, f64> = HashMap::new();
        let mut predecessor: HashMap<V, (EdgeIndex, V)> = HashMap::new();

        if self.index_of.contains_key(&source) {
            distance.insert(source, 0.0);
        } else {
            return ShortestPaths { distance, predecessor };
        }

        // Collect a deterministically ordered edge list (both orientations)
        // once, then relax repeatedly. |V| - 1 rounds always suffice for a
        // graph with no negative cycles (costs are non-negative here).
        let mut directed_edges: Vec<(V, V, EdgeIndex, EdgeWeight)> = Vec::new();
        for edge in self.inner.edge_references() {
            let a = self.vertex_of[&edge.source()];
            let b = self.vertex_of[&edge.target()];
            directed_edges.push((a, b, edge.id(), *edge.weight()));
            directed_edges.push((b, a, edge.id(), *edge.weight()));
        }
        directed_edges.sort_by(|x, y| edge_order(&x.3, x.2, &y.3, y.2));

        let rounds = self.index_of.len().saturating_sub(1).max(1);
        for _ in 0..rounds {
            let mut changed = false;
            for (from, to, edge, weight) in directed_edges.iter().copied() {
                let Some(&d_from) = distance.get(&from) else { continue };
                let candidate = d_from + weight.cost;
                let improve = match distance.get(&to) {
                    None => true,
                    Some(&d_to) => candidate < d_to - f64::EPSILON,
                };
                if improve {
                    distance.insert(to, candidate);
                    predecessor.insert(to, (edge, from));
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        ShortestPaths { distance, predecessor }
    }

    /// Minimum spanning tree over every vertex in the graph (Prim, heap
    /// keyed by edge cost, deterministic tie-break). Returns the set of
    /// edges in the tree; a disconnected graph yields a spanning forest
    /// (one tree per component).
    pub fn minimum_spanning_tree(&self) -> Vec<EdgeIndex> {
        #[derive(PartialEq)]
        struct HeapItem {
            weight: EdgeWeight,
            edge: EdgeIndex,
            to: NodeIndex,
        }
        impl Eq for HeapItem {}
        impl Ord for HeapItem {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                // BinaryHeap is a max-heap; reverse so the smallest (by our
                // deterministic total order) comes out first.
                edge_order(&other.weight, other.edge, &self.weight, self.edge)
            }
        }
        impl PartialOrd for HeapItem {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut tree_edges = Vec::new();
        let mut visited: HashMap<NodeIndex, bool> = HashMap::new();
        for v in self.vertices() {
            visited.insert(self.index_of[&v], false);
        }

        for start in self.vertices() {
            let start_idx = self.index_of[&start];
            if visited[&start_idx] {
                continue;
            }
            visited.insert(start_idx, true);
            let mut heap = BinaryHeap::new();
            push_frontier(&self.inner, start_idx, &visited, &mut heap);

            while let Some(HeapItem { weight, edge, to }) = heap.pop() {
                if visited[&to] {
                    continue;
                }
                visited.insert(to, true);
                tree_edges.push(edge);
                let _ = weight;
                push_frontier(&self.inner, to, &visited, &mut heap);
            }
        }

        fn push_frontier(
            inner: &UnGraph<(), EdgeWeight>,
            from: NodeIndex,
            visited: &HashMap<NodeIndex, bool>,
            heap: &mut BinaryHeap<HeapItem>,
        ) {
            for edge in inner.edges(from) {
                let to = if edge.source() == from { edge.target() } else { edge.source() };
                if !visited[&to] {
                    heap.push(HeapItem { weight: *edge.weight(), edge: edge.id(), to });
                }
            }
        }

        tree_edges
    }

    /// Goal-set spanning tree: the standard 2-approximation to the Steiner
    /// tree problem over the vertex set `terminals`, subject to every used
    /// edge having capacity `>= min_capacity` (§4.1).
    ///
    /// Algorithm: filter out under-capacity edges; compute shortest paths
    /// from every terminal to build the metric closure; take the MST of the
    /// metric closure; substitute each closure edge with its underlying
    /// path; reduce the resulting (possibly cyclic) edge union back to a
    /// tree. Fails with [`Error::Unroutable`] if any terminal is
    /// unreachable from the others.
    pub fn goal_set_spanning_tree(&self, terminals: &[V], min_capacity: f64) -> Result<Vec<EdgeIndex>, Error> {
        if terminals.len() <= 1 {
            return Ok(Vec::new());
        }

        let filtered = self.filter_by_capacity(min_capacity);

        // Shortest paths from every terminal, over the filtered graph.
        let mut paths: HashMap<V, ShortestPaths<V>> = HashMap::new();
        for &t in terminals {
            paths.insert(t, filtered.shortest_paths(t));
        }

        // Metric closure over the terminal set.
        let mut closure: Graph<V> = Graph::new();
        for &t in terminals {
            closure.add_vertex(t);
        }
        for (a, b) in terminals.iter().copied().tuple_combinations::<(V, V)>() {
            let sp = &paths[&a];
            let Some(&dist) = sp.distance.get(&b) else {
                return Err(Error::Unroutable);
            };
            closure.add_edge(a, b, EdgeWeight { cost: dist, capacity: min_capacity.max(0.0) });
        }

        let closure_mst = closure.minimum_spanning_tree();

        // Substitute each closure edge with its underlying path in `filtered`,
        // collecting the union of underlying edges (may contain cycles if
        // paths overlap).
        let mut union: Vec<EdgeIndex> = Vec::new();
        let mut seen: HashMap<(V, V), bool> = HashMap::new();
        for ce in closure_mst {
            let (a, b, _) = closure.edge_endpoints(ce).expect("mst edge exists");
            let sp = &paths[&a];
            let Some(path) = sp.path_edges(b) else {
                return Err(Error::Unroutable);
            };
            for e in path {
                let (ea, eb, _) = filtered.edge_endpoints(e).expect("path edge exists");
                let key = if ea <= eb { (ea, eb) } else { (eb, ea) };
                if seen.insert(key, true).is_none() {
                    union.push(e);
                }
            }
        }

        // Reduce the edge union to a tree: rebuild a small graph out of just
        // these edges and terminals (plus any Steiner points the paths
        // passed through) and take its MST. Since every edge in `union`
        // already lies in the filtered (capacity-gated) graph, the result
        // still respects the capacity gate.
        let mut reduced: Graph<V> = Graph::new();
        for e in &union {
            let (a, b, w) = filtered.edge_endpoints(*e).expect("union edge exists");
            reduced.add_edge(a, b, w);
        }
        Ok(reduced.minimum_spanning_tree_with_source_edges(&filtered, &union))
    }

    /// Helper for [`Self::goal_set_spanning_tree`]: computes the MST of
    /// `self` (built purely from `source_edges`) but returns the
    /// corresponding edge indices from `source`, preserving identity with
    /// the original graph's trunk-backed edges.
    fn minimum_spanning_tree_with_source_edges(&self, source: &Graph<V>, source_edges: &[EdgeIndex]) -> Vec<EdgeIndex> {
        let local_tree = self.minimum_spanning_tree();
        // Map back: for every edge kept in the local (reduced) MST, find the
        // matching edge in `source_edges` with the same endpoint pair and
        // weight. Ties among parallel edges are broken by `edge_order`,
        // consistent with the rest of the module.
        let mut result = Vec::new();
        for local_edge in local_tree {
            let (a, b, w) = self.edge_endpoints(local_edge).expect("local edge exists");
            let mut candidates: Vec<EdgeIndex> = source_edges
                .iter()
                .copied()
                .filter(|e| {
                    let (sa, sb, sw) = source.edge_endpoints(*e).expect("source edge exists");
                    ((sa == a && sb == b) || (sa == b && sb == a)) && sw == w
                })
                .collect();
            candidates.sort_by(|x, y| {
                let wx = source.edge_endpoints(*x).unwrap().2;
                let wy = source.edge_endpoints(*y).unwrap().2;
                edge_order(&wx, *x, &wy, *y)
            });
            if let Some(first) = candidates.into_iter().next() {
                result.push(first);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(cost: f64, capacity: f64) -> EdgeWeight {
        EdgeWeight { cost, capacity }
    }

    #[test]
    fn shortest_path_picks_cheapest_route() {
        let mut g: Graph<u32> = Graph::new();
        g.add_edge(1, 2, w(1.0, 100.0));
        g.add_edge(2, 3, w(1.0, 100.0));
        g.add_edge(1, 3, w(5.0, 100.0));

        let sp = g.shortest_paths(1);
        assert_eq!(sp.distance[&3], 2.0);
        assert_eq!(sp.path_edges(3).unwrap().len(), 2);
    }

    #[test]
    fn unreachable_vertex_is_absent() {
        let mut g: Graph<u32> = Graph::new();
        g.add_edge(1, 2, w(1.0, 100.0));
        g.add_vertex(99);
        let sp = g.shortest_paths(1);
        assert!(!sp.distance.contains_key(&99));
    }

    #[test]
    fn mst_is_deterministic_under_ties() {
        let mut g: Graph<u32> = Graph::new();
        g.add_edge(1, 2, w(1.0, 100.0));
        g.add_edge(1, 2, w(1.0, 50.0)); // parallel, same cost, less capacity
        g.add_edge(2, 3, w(1.0, 10.0));
        let tree = g.minimum_spanning_tree();
        assert_eq!(tree.len(), 2);
        // the higher-capacity parallel edge must win the tie
        let (_, _, chosen) = g.edge_endpoints(tree[0]).unwrap();
        assert_eq!(chosen.capacity, 100.0);
    }

    #[test]
    fn goal_set_tree_respects_capacity_gate() {
        let mut g: Graph<u32> = Graph::new();
        g.add_edge(1, 2, w(1.0, 5.0));
        g.add_edge(2, 3, w(1.0, 100.0));
        g.add_edge(1, 3, w(10.0, 100.0));

        // with gate 10, the 1-2 edge (capacity 5) is excluded, forcing the
        // direct 1-3 edge.
        let tree = g.goal_set_spanning_tree(&[1, 2, 3], 10.0).unwrap();
        let total_cost: f64 = tree.iter().map(|e| g.edge_endpoints(*e).unwrap().2.cost).sum();
        assert!(total_cost >= 10.0);
    }

    #[test]
    fn goal_set_tree_fails_when_unroutable() {
        let mut g: Graph<u32> = Graph::new();
        g.add_edge(1, 2, w(1.0, 100.0));
        g.add_vertex(3); // isolated
        assert_eq!(g.goal_set_spanning_tree(&[1, 2, 3], 0.0), Err(Error::Unroutable));
    }
}
