//! NetworkQos — keeps linked microservices within their QoS requirements.
//!
//! For a request belonging to a service graph, PreFilter collects every
//! link of its service whose peer is already placed and computes
//! QoS-compliant shortest paths from the peer's nodes. Filter rejects a
//! node when some link has no compliant path to it. Score prefers nodes
//! with lower total path delay.

use std::sync::Arc;

use fog_core::config::PluginSettings;
use fog_core::{LinkQosRequirements, MAX_NODE_SCORE, NodeInfo, WorkloadRequest};
use foggrid_topology::ShortestPaths;

use crate::cycle_state::{CycleState, StateKey};
use crate::error::SchedulerResult;
use crate::plugin::{Capabilities, Plugin};
use crate::registry::SchedulerHandle;
use crate::status::Status;
use crate::topology::TopologyCatalog;

pub const NAME: &str = "NetworkQos";

/// Links to already-placed peers, with paths from each peer node.
pub const LINKS: StateKey<Vec<PlacedLink>> = StateKey::new("NetworkQos/links");

#[derive(Debug, Clone)]
pub struct PlacedLink {
    pub peer: String,
    pub requirements: LinkQosRequirements,
    /// Shortest compliant paths rooted at each node hosting the peer.
    pub sources: Vec<ShortestPaths>,
}

pub struct NetworkQos {
    topology: Arc<TopologyCatalog>,
}

impl NetworkQos {
    pub fn new(topology: Arc<TopologyCatalog>) -> Self {
        Self { topology }
    }

    /// Delay of the best compliant path to `node` for `link`.
    fn best_delay(&self, link: &PlacedLink, node: &str) -> Option<u64> {
        let region = self.topology.region();
        link.sources
            .iter()
            .filter_map(|paths| region.path_qos(paths, node))
            .filter(|qos| link.requirements.is_satisfied_by_path(qos))
            .map(|qos| qos.total_delay_ms)
            .min()
    }
}

pub fn factory(_settings: &PluginSettings, handle: &SchedulerHandle) -> SchedulerResult<Arc<dyn Plugin>> {
    Ok(Arc::new(NetworkQos::new(handle.topology.clone())))
}

impl Plugin for NetworkQos {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PRE_FILTER | Capabilities::FILTER | Capabilities::SCORE
    }

    fn pre_filter(&self, state: &mut CycleState, request: &WorkloadRequest) -> Status {
        let mut placed = Vec::new();

        if let Some(member) = &request.service_graph {
            let Some(graph) = self.topology.service_graph(&member.graph) else {
                return Status::unschedulable(format!("unknown service graph {}", member.graph));
            };
            if !graph.contains(&member.service) {
                return Status::unschedulable(format!(
                    "service {} is not part of graph {}",
                    member.service, member.graph
                ));
            }

            let region = self.topology.region();
            for link in graph.links_of(&member.service) {
                let peer_nodes = self.topology.placed_nodes(&member.graph, &link.peer);
                if peer_nodes.is_empty() {
                    continue;
                }
                let sources = peer_nodes
                    .iter()
                    .filter_map(|n| region.compliant_paths_from(n, &link.requirements))
                    .collect();
                placed.push(PlacedLink {
                    peer: link.peer,
                    requirements: link.requirements,
                    sources,
                });
            }
        }

        match state.write(&LINKS, placed) {
            Ok(()) => Status::Success,
            Err(e) => Status::internal(e),
        }
    }

    fn filter(&self, state: &CycleState, _request: &WorkloadRequest, node: &NodeInfo) -> Status {
        let links = match state.read(&LINKS) {
            Ok(l) => l,
            Err(e) => return Status::internal(e),
        };
        for link in links {
            if self.best_delay(link, &node.name).is_none() {
                return Status::unschedulable(format!(
                    "no path from {} meets the link QoS requirements",
                    link.peer
                ));
            }
        }
        Status::Success
    }

    fn score(&self, state: &CycleState, _request: &WorkloadRequest, node: &NodeInfo) -> Result<i64, Status> {
        let links = state.read(&LINKS).map_err(Status::internal)?;
        if links.is_empty() {
            return Ok(MAX_NODE_SCORE);
        }
        let total: u64 = links
            .iter()
            .filter_map(|link| self.best_delay(link, &node.name))
            .sum();
        let average = total / links.len() as u64;
        Ok(MAX_NODE_SCORE - average.min(MAX_NODE_SCORE as u64) as i64)
    }
}
