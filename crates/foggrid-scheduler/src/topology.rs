//! Topology catalog shared by topology-aware plugins.
//!
//! The region and service graphs are immutable after startup; the
//! placement maps and per-node last-use times change as requests are
//! reserved.

use std::collections::HashMap;

use fog_core::config::TopologyConfig;
use foggrid_topology::{PlacementMap, RegionGraph, ServiceGraph, TopologyError, TopologyResult};
use parking_lot::RwLock;
use tracing::info;

#[derive(Debug, Default)]
pub struct TopologyCatalog {
    region: RegionGraph,
    service_graphs: HashMap<String, ServiceGraph>,
    placements: RwLock<HashMap<String, PlacementMap>>,
    /// Node name to epoch millis of its latest reservation.
    last_used: RwLock<HashMap<String, u64>>,
}

impl TopologyCatalog {
    pub fn new(region: RegionGraph, service_graphs: Vec<ServiceGraph>) -> TopologyResult<Self> {
        let mut by_name = HashMap::new();
        for sg in service_graphs {
            let name = sg.name().to_string();
            if by_name.insert(name.clone(), sg).is_some() {
                return Err(TopologyError::DuplicateServiceGraph(name));
            }
        }
        Ok(Self {
            region,
            service_graphs: by_name,
            placements: RwLock::new(HashMap::new()),
            last_used: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &TopologyConfig) -> TopologyResult<Self> {
        let region = RegionGraph::from_config(config)?;
        let graphs = config
            .service_graphs
            .iter()
            .map(ServiceGraph::from_config)
            .collect::<TopologyResult<Vec<_>>>()?;
        let catalog = Self::new(region, graphs)?;
        info!(
            nodes = config.nodes.len(),
            service_graphs = catalog.service_graphs.len(),
            "topology catalog loaded"
        );
        Ok(catalog)
    }

    pub fn region(&self) -> &RegionGraph {
        &self.region
    }

    pub fn service_graph(&self, name: &str) -> Option<&ServiceGraph> {
        self.service_graphs.get(name)
    }

    /// Nodes currently hosting `service` of `graph`.
    pub fn placed_nodes(&self, graph: &str, service: &str) -> Vec<String> {
        self.placements
            .read()
            .get(graph)
            .map(|map| map.nodes_of(service).map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn record_placement(&self, graph: &str, service: &str, node: &str) {
        self.placements
            .write()
            .entry(graph.to_string())
            .or_default()
            .record(service, node);
    }

    pub fn remove_placement(&self, graph: &str, service: &str, node: &str) -> bool {
        self.placements
            .write()
            .get_mut(graph)
            .is_some_and(|map| map.remove(service, node))
    }

    pub fn node_last_used(&self, node: &str) -> Option<u64> {
        self.last_used.read().get(node).copied()
    }

    /// Record a reservation on `node`. Returns the previous time.
    pub fn mark_node_used(&self, node: &str, at_ms: u64) -> Option<u64> {
        self.last_used.write().insert(node.to_string(), at_ms)
    }

    /// Put back what [`mark_node_used`](Self::mark_node_used) replaced.
    pub fn restore_node_use(&self, node: &str, previous: Option<u64>) {
        let mut last_used = self.last_used.write();
        match previous {
            Some(at_ms) => last_used.insert(node.to_string(), at_ms),
            None => last_used.remove(node),
        };
    }
}
