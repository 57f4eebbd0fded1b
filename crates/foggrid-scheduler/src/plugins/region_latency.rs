//! RegionHeadLatency — bounds the delay between a service-graph member's
//! node and the region head.
//!
//! Paths from the head are computed once at construction; the region
//! graph does not change after startup.

use std::sync::Arc;

use fog_core::config::PluginSettings;
use fog_core::{MAX_NODE_SCORE, NodeInfo, WorkloadRequest};
use foggrid_topology::ShortestPaths;

use crate::cycle_state::CycleState;
use crate::error::SchedulerResult;
use crate::plugin::{Capabilities, Plugin};
use crate::registry::SchedulerHandle;
use crate::status::Status;
use crate::topology::TopologyCatalog;

pub const NAME: &str = "RegionHeadLatency";

pub struct RegionHeadLatency {
    topology: Arc<TopologyCatalog>,
    from_head: Option<ShortestPaths>,
}

impl RegionHeadLatency {
    pub fn new(topology: Arc<TopologyCatalog>) -> Self {
        let from_head = topology
            .region()
            .region_head()
            .and_then(|head| topology.region().shortest_paths_from(head));
        Self { topology, from_head }
    }

    fn delay_to(&self, node: &str) -> Option<u64> {
        let paths = self.from_head.as_ref()?;
        let idx = self.topology.region().graph().index_of(node)?;
        paths.distance_to(idx)
    }

    fn max_delay_for(&self, request: &WorkloadRequest) -> Option<u64> {
        let member = request.service_graph.as_ref()?;
        let graph = self.topology.service_graph(&member.graph)?;
        graph.max_delay_ms().map(u64::from)
    }
}

pub fn factory(_settings: &PluginSettings, handle: &SchedulerHandle) -> SchedulerResult<Arc<dyn Plugin>> {
    Ok(Arc::new(RegionHeadLatency::new(handle.topology.clone())))
}

impl Plugin for RegionHeadLatency {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FILTER | Capabilities::SCORE
    }

    fn filter(&self, _state: &CycleState, request: &WorkloadRequest, node: &NodeInfo) -> Status {
        if self.from_head.is_none() {
            return Status::Success;
        }
        let Some(max_delay) = self.max_delay_for(request) else {
            return Status::Success;
        };
        match self.delay_to(&node.name) {
            Some(delay) if delay <= max_delay => Status::Success,
            Some(delay) => Status::unschedulable(format!(
                "{delay}ms from region head exceeds {max_delay}ms"
            )),
            None => Status::unschedulable("unreachable from region head"),
        }
    }

    fn score(&self, _state: &CycleState, _request: &WorkloadRequest, node: &NodeInfo) -> Result<i64, Status> {
        if self.from_head.is_none() {
            return Ok(MAX_NODE_SCORE);
        }
        Ok(match self.delay_to(&node.name) {
            Some(delay) => MAX_NODE_SCORE - delay.min(MAX_NODE_SCORE as u64) as i64,
            None => 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fog_core::{Latency, NetworkLinkQos, QualityClass, Resources, ServiceGraphMembership, Throughput};
    use foggrid_topology::{RegionGraph, ServiceGraph};

    fn link(delay: u32) -> NetworkLinkQos {
        NetworkLinkQos {
            quality_class: QualityClass::Qc100Mbps,
            throughput: Throughput::default(),
            latency: Latency {
                packet_delay_ms: delay,
                variance: 0.0,
            },
            packet_loss_bp: 0,
        }
    }

    /// head -10- near -50- far, plus an isolated node.
    fn catalog(with_head: bool) -> Arc<TopologyCatalog> {
        let mut region = RegionGraph::new();
        for n in ["head", "near", "far", "island"] {
            region.add_region_node(n);
        }
        region.set_link("head", "near", link(10)).unwrap();
        region.set_link("near", "far", link(50)).unwrap();
        if with_head {
            region.set_region_head("head").unwrap();
        }
        let shop = ServiceGraph::new("shop").with_max_delay_ms(Some(20));
        Arc::new(TopologyCatalog::new(region, vec![shop]).unwrap())
    }

    fn member() -> WorkloadRequest {
        WorkloadRequest {
            id: "r".to_string(),
            containers: Vec::new(),
            priority: 0,
            created_at_ms: 0,
            service_graph: Some(ServiceGraphMembership {
                graph: "shop".to_string(),
                service: "cart".to_string(),
            }),
        }
    }

    fn node(name: &str) -> NodeInfo {
        NodeInfo::new(name, "r", Resources::new())
    }

    #[test]
    fn filter_by_head_delay() {
        let plugin = RegionHeadLatency::new(catalog(true));
        let state = CycleState::new();
        let req = member();
        assert!(plugin.filter(&state, &req, &node("head")).is_success());
        assert!(plugin.filter(&state, &req, &node("near")).is_success());
        assert!(matches!(plugin.filter(&state, &req, &node("far")), Status::Unschedulable(_)));
        assert!(matches!(plugin.filter(&state, &req, &node("island")), Status::Unschedulable(_)));
    }

    #[test]
    fn non_members_pass() {
        let plugin = RegionHeadLatency::new(catalog(true));
        let mut req = member();
        req.service_graph = None;
        assert!(plugin.filter(&CycleState::new(), &req, &node("far")).is_success());
    }

    #[test]
    fn scores_prefer_nearby_nodes() {
        let plugin = RegionHeadLatency::new(catalog(true));
        let state = CycleState::new();
        let req = member();
        assert_eq!(plugin.score(&state, &req, &node("head")), Ok(100));
        assert_eq!(plugin.score(&state, &req, &node("near")), Ok(90));
        assert_eq!(plugin.score(&state, &req, &node("far")), Ok(40));
        assert_eq!(plugin.score(&state, &req, &node("island")), Ok(0));
    }

    #[test]
    fn without_region_head() {
        let plugin = RegionHeadLatency::new(catalog(false));
        let state = CycleState::new();
        assert!(plugin.filter(&state, &member(), &node("far")).is_success());
        assert_eq!(plugin.score(&state, &member(), &node("far")), Ok(MAX_NODE_SCORE));
    }
}
