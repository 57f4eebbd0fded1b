//! PlacementRecorder — records placements at Reserve.
//!
//! Every reservation stamps the node's last-use time in the catalog.
//! Service-graph members are also added to their graph's placement map so
//! later requests of the same graph see where their peers run.

use std::sync::Arc;

use fog_core::config::PluginSettings;
use fog_core::{NodeInfo, WorkloadRequest, epoch_millis};
use tracing::debug;

use crate::cycle_state::{CycleState, StateKey};
use crate::error::SchedulerResult;
use crate::plugin::{Capabilities, Plugin};
use crate::registry::SchedulerHandle;
use crate::status::Status;
use crate::topology::TopologyCatalog;

pub const NAME: &str = "PlacementRecorder";

/// Set when this cycle added a placement that was not recorded before.
const RECORDED: StateKey<bool> = StateKey::new("PlacementRecorder/recorded");

/// Last-use time of the node before this cycle's reservation.
const PREVIOUS_USE: StateKey<Option<u64>> = StateKey::new("PlacementRecorder/previous-use");

pub struct PlacementRecorder {
    topology: Arc<TopologyCatalog>,
}

impl PlacementRecorder {
    pub fn new(topology: Arc<TopologyCatalog>) -> Self {
        Self { topology }
    }
}

pub fn factory(_settings: &PluginSettings, handle: &SchedulerHandle) -> SchedulerResult<Arc<dyn Plugin>> {
    Ok(Arc::new(PlacementRecorder::new(handle.topology.clone())))
}

impl Plugin for PlacementRecorder {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RESERVE
    }

    fn reserve(&self, state: &mut CycleState, request: &WorkloadRequest, node: &NodeInfo) -> Status {
        let previous = self.topology.mark_node_used(&node.name, epoch_millis());
        if let Err(e) = state.write(&PREVIOUS_USE, previous) {
            return Status::internal(e);
        }

        let Some(member) = &request.service_graph else {
            return Status::Success;
        };
        let fresh = !self
            .topology
            .placed_nodes(&member.graph, &member.service)
            .iter()
            .any(|n| *n == node.name);
        self.topology
            .record_placement(&member.graph, &member.service, &node.name);
        debug!(
            graph = %member.graph,
            service = %member.service,
            node = %node.name,
            "placement recorded"
        );
        match state.write(&RECORDED, fresh) {
            Ok(()) => Status::Success,
            Err(e) => Status::internal(e),
        }
    }

    fn unreserve(&self, state: &mut CycleState, request: &WorkloadRequest, node: &NodeInfo) {
        if let Ok(previous) = state.read(&PREVIOUS_USE) {
            self.topology.restore_node_use(&node.name, *previous);
        }

        let Some(member) = &request.service_graph else {
            return;
        };
        if state.read(&RECORDED).copied().unwrap_or(false) {
            self.topology
                .remove_placement(&member.graph, &member.service, &node.name);
            let _ = state.write(&RECORDED, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fog_core::{Resources, ServiceGraphMembership};

    fn request(service: &str) -> WorkloadRequest {
        WorkloadRequest {
            id: "r".to_string(),
            containers: Vec::new(),
            priority: 0,
            created_at_ms: 0,
            service_graph: Some(ServiceGraphMembership {
                graph: "shop".to_string(),
                service: service.to_string(),
            }),
        }
    }

    #[test]
    fn reserve_then_unreserve() {
        let catalog = Arc::new(TopologyCatalog::default());
        let plugin = PlacementRecorder::new(catalog.clone());
        let node = NodeInfo::new("n1", "r", Resources::new());
        let req = request("cart");

        let mut state = CycleState::new();
        assert!(plugin.reserve(&mut state, &req, &node).is_success());
        assert_eq!(catalog.placed_nodes("shop", "cart"), vec!["n1"]);
        assert!(catalog.node_last_used("n1").is_some());

        plugin.unreserve(&mut state, &req, &node);
        assert!(catalog.placed_nodes("shop", "cart").is_empty());
        assert_eq!(catalog.node_last_used("n1"), None);
    }

    #[test]
    fn unreserve_keeps_earlier_placement() {
        let catalog = Arc::new(TopologyCatalog::default());
        catalog.record_placement("shop", "cart", "n1");
        catalog.mark_node_used("n1", 42);
        let plugin = PlacementRecorder::new(catalog.clone());
        let node = NodeInfo::new("n1", "r", Resources::new());
        let req = request("cart");

        let mut state = CycleState::new();
        assert!(plugin.reserve(&mut state, &req, &node).is_success());
        plugin.unreserve(&mut state, &req, &node);
        assert_eq!(catalog.placed_nodes("shop", "cart"), vec!["n1"]);
        assert_eq!(catalog.node_last_used("n1"), Some(42));
    }

    #[test]
    fn non_members_only_mark_node_use() {
        let catalog = Arc::new(TopologyCatalog::default());
        let plugin = PlacementRecorder::new(catalog.clone());
        let mut req = request("cart");
        req.service_graph = None;
        let mut state = CycleState::new();
        assert!(plugin
            .reserve(&mut state, &req, &NodeInfo::new("n1", "r", Resources::new()))
            .is_success());
        assert!(!state.contains(&RECORDED));
        assert!(catalog.placed_nodes("shop", "cart").is_empty());
        assert!(catalog.node_last_used("n1").is_some());
    }
}
