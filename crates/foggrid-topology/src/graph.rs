//! Labeled graph stored as an index arena.
//!
//! Vertices live in a `Vec` and are addressed by a stable [`NodeIndex`];
//! a label→index map gives O(1) lookup by label. Edges are kept in
//! per-vertex ordered adjacency maps so iteration order is deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use fog_core::{LinkQosRequirements, NetworkLinkQos};

use crate::error::{TopologyError, TopologyResult};

pub type NodeIndex = usize;

/// Converts an edge payload into the scalar used as shortest-path weight.
pub trait EdgeWeight {
    fn scalar(&self) -> u64;
}

impl EdgeWeight for u64 {
    fn scalar(&self) -> u64 {
        *self
    }
}

impl EdgeWeight for NetworkLinkQos {
    fn scalar(&self) -> u64 {
        self.scalar_weight()
    }
}

impl EdgeWeight for LinkQosRequirements {
    fn scalar(&self) -> u64 {
        self.scalar_weight()
    }
}

#[derive(Debug, Clone)]
pub struct LabeledGraph<N, W> {
    directed: bool,
    labels: Vec<String>,
    data: Vec<N>,
    index: HashMap<String, NodeIndex>,
    outgoing: Vec<BTreeMap<NodeIndex, W>>,
    incoming: Vec<BTreeSet<NodeIndex>>,
}

impl<N, W> LabeledGraph<N, W> {
    /// Graph whose edges are traversable in both directions.
    pub fn undirected() -> Self {
        Self::with_direction(false)
    }

    pub fn directed() -> Self {
        Self::with_direction(true)
    }

    fn with_direction(directed: bool) -> Self {
        Self {
            directed,
            labels: Vec::new(),
            data: Vec::new(),
            index: HashMap::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Add a vertex.
    ///
    /// # Panics
    ///
    /// Panics if `label` is already present. Use [`try_add_node`](Self::try_add_node)
    /// for input that has not been validated.
    pub fn add_node(&mut self, label: impl Into<String>, data: N) -> NodeIndex {
        let label = label.into();
        match self.try_add_node(label.clone(), data) {
            Ok(idx) => idx,
            Err(_) => panic!("graph already contains a node labeled {label:?}"),
        }
    }

    pub fn try_add_node(&mut self, label: impl Into<String>, data: N) -> TopologyResult<NodeIndex> {
        let label = label.into();
        if self.index.contains_key(&label) {
            return Err(TopologyError::DuplicateLabel(label));
        }
        let idx = self.labels.len();
        self.index.insert(label.clone(), idx);
        self.labels.push(label);
        self.data.push(data);
        self.outgoing.push(BTreeMap::new());
        self.incoming.push(BTreeSet::new());
        Ok(idx)
    }

    pub fn index_of(&self, label: &str) -> Option<NodeIndex> {
        self.index.get(label).copied()
    }

    pub fn node_by_label(&self, label: &str) -> Option<&N> {
        self.index_of(label).map(|idx| &self.data[idx])
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&N> {
        self.data.get(idx)
    }

    pub fn label(&self, idx: NodeIndex) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Insert or replace the edge `from -> to` (and `to -> from` when undirected).
    pub fn set_edge(&mut self, from: &str, to: &str, weight: W) -> TopologyResult<()>
    where
        W: Clone,
    {
        let a = self
            .index_of(from)
            .ok_or_else(|| TopologyError::UnknownLabel(from.to_string()))?;
        let b = self
            .index_of(to)
            .ok_or_else(|| TopologyError::UnknownLabel(to.to_string()))?;

        if !self.directed {
            self.outgoing[b].insert(a, weight.clone());
            self.incoming[a].insert(b);
        }
        self.outgoing[a].insert(b, weight);
        self.incoming[b].insert(a);
        Ok(())
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&W> {
        let a = self.index_of(from)?;
        let b = self.index_of(to)?;
        self.edge_between(a, b)
    }

    pub fn edge_between(&self, from: NodeIndex, to: NodeIndex) -> Option<&W> {
        self.outgoing.get(from)?.get(&to)
    }

    /// Vertices reachable over one outgoing edge, in index order.
    pub fn neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, &W)> {
        self.outgoing
            .get(idx)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(to, w)| (*to, w)))
    }

    /// Vertices with an edge pointing at `idx`, in index order.
    pub fn predecessors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.incoming
            .get(idx)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }
}
