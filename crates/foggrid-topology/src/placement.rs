//! Placement map: which region-graph nodes host each microservice of a
//! service graph.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementMap {
    placements: BTreeMap<String, BTreeSet<String>>,
}

impl PlacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node` hosts an instance of `service`.
    pub fn record(&mut self, service: &str, node: &str) {
        self.placements
            .entry(service.to_string())
            .or_default()
            .insert(node.to_string());
    }

    /// Returns true if the record existed.
    pub fn remove(&mut self, service: &str, node: &str) -> bool {
        let Some(nodes) = self.placements.get_mut(service) else {
            return false;
        };
        let removed = nodes.remove(node);
        if nodes.is_empty() {
            self.placements.remove(service);
        }
        removed
    }

    pub fn nodes_of(&self, service: &str) -> impl Iterator<Item = &str> {
        self.placements
            .get(service)
            .into_iter()
            .flat_map(|nodes| nodes.iter().map(String::as_str))
    }

    pub fn is_placed(&self, service: &str) -> bool {
        self.placements.contains_key(service)
    }
}
