//! Service graph: the microservices of one distributed application and the
//! QoS their links require.

use fog_core::LinkQosRequirements;
use fog_core::config::ServiceGraphConfig;

use crate::error::TopologyResult;
use crate::graph::{LabeledGraph, NodeIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// The peer calls this service.
    Incoming,
    /// This service calls the peer.
    Outgoing,
}

/// A link seen from one of its endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceLink {
    pub peer: String,
    pub direction: LinkDirection,
    pub requirements: LinkQosRequirements,
}

#[derive(Debug, Clone)]
pub struct ServiceGraph {
    name: String,
    max_delay_ms: Option<u32>,
    graph: LabeledGraph<(), LinkQosRequirements>,
}

impl ServiceGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_delay_ms: None,
            graph: LabeledGraph::directed(),
        }
    }

    pub fn from_config(config: &ServiceGraphConfig) -> TopologyResult<Self> {
        let mut sg = Self::new(config.name.clone()).with_max_delay_ms(config.max_delay_ms);
        for service in &config.services {
            sg.try_add_service(service)?;
        }
        for link in &config.links {
            sg.link(&link.from, &link.to, link.qos.clone())?;
        }
        Ok(sg)
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: Option<u32>) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum delay tolerated between any member's node and the region head.
    pub fn max_delay_ms(&self) -> Option<u32> {
        self.max_delay_ms
    }

    /// # Panics
    ///
    /// Panics if the service label already exists in this graph.
    pub fn add_service(&mut self, label: &str) -> NodeIndex {
        self.graph.add_node(label, ())
    }

    pub fn try_add_service(&mut self, label: &str) -> TopologyResult<NodeIndex> {
        self.graph.try_add_node(label, ())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.graph.index_of(label).is_some()
    }

    /// Declare that `from` calls `to` with the given requirements.
    pub fn link(&mut self, from: &str, to: &str, requirements: LinkQosRequirements) -> TopologyResult<()> {
        self.graph.set_edge(from, to, requirements)
    }

    /// Every link touching `service`, incoming first, each group in
    /// insertion order of the peers.
    pub fn links_of(&self, service: &str) -> Vec<ServiceLink> {
        let Some(idx) = self.graph.index_of(service) else {
            return Vec::new();
        };

        let incoming = self.graph.predecessors(idx).filter_map(|peer| {
            Some(ServiceLink {
                peer: self.graph.label(peer)?.to_string(),
                direction: LinkDirection::Incoming,
                requirements: self.graph.edge_between(peer, idx)?.clone(),
            })
        });
        let outgoing = self.graph.neighbors(idx).filter_map(|(peer, req)| {
            Some(ServiceLink {
                peer: self.graph.label(peer)?.to_string(),
                direction: LinkDirection::Outgoing,
                requirements: req.clone(),
            })
        });
        incoming.chain(outgoing).collect()
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.graph.labels()
    }
}
