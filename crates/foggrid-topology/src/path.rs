//! Single-source shortest paths (Dijkstra) over [`LabeledGraph`].

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::graph::{EdgeWeight, LabeledGraph, NodeIndex};

/// Shortest-path tree rooted at one source vertex.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    source: NodeIndex,
    dist: Vec<Option<u64>>,
    prev: Vec<Option<NodeIndex>>,
}

impl ShortestPaths {
    pub fn source(&self) -> NodeIndex {
        self.source
    }

    /// Total weight of the shortest path to `target`, `None` if unreachable.
    pub fn distance_to(&self, target: NodeIndex) -> Option<u64> {
        self.dist.get(target).copied().flatten()
    }

    /// Vertices from the source to `target`, both inclusive.
    pub fn path_to(&self, target: NodeIndex) -> Option<Vec<NodeIndex>> {
        self.distance_to(target)?;
        let mut path = vec![target];
        let mut cur = target;
        while let Some(p) = self.prev[cur] {
            path.push(p);
            cur = p;
        }
        path.reverse();
        Some(path)
    }
}

impl<N, W: EdgeWeight> LabeledGraph<N, W> {
    pub fn shortest_paths_from(&self, source: NodeIndex) -> ShortestPaths {
        self.shortest_paths_where(source, |_| true)
    }

    /// Dijkstra restricted to edges accepted by `usable`.
    pub fn shortest_paths_where<F>(&self, source: NodeIndex, usable: F) -> ShortestPaths
    where
        F: Fn(&W) -> bool,
    {
        let n = self.len();
        let mut dist: Vec<Option<u64>> = vec![None; n];
        let mut prev: Vec<Option<NodeIndex>> = vec![None; n];

        if source < n {
            dist[source] = Some(0);
            let mut heap = BinaryHeap::new();
            heap.push(Reverse((0u64, source)));

            while let Some(Reverse((d, u))) = heap.pop() {
                if dist[u].is_some_and(|best| d > best) {
                    continue;
                }
                for (v, w) in self.neighbors(u) {
                    if !usable(w) {
                        continue;
                    }
                    let candidate = d.saturating_add(w.scalar());
                    if dist[v].is_none_or(|best| candidate < best) {
                        dist[v] = Some(candidate);
                        prev[v] = Some(u);
                        heap.push(Reverse((candidate, v)));
                    }
                }
            }
        }

        ShortestPaths { source, dist, prev }
    }
}
