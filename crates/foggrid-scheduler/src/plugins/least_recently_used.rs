//! LeastRecentlyUsedNode — prefers nodes that have gone longest without a
//! new workload.
//!
//! PreFilter fixes the scoring start once per cycle so every node is
//! measured against the same instant. A node's last use is the later of
//! what its agent reports and what this scheduler last reserved on it.
//! Idle time is scored linearly up to `window_ms`; nodes never used, or
//! idle for the whole window, get the maximum.

use std::sync::Arc;

use fog_core::config::PluginSettings;
use fog_core::{MAX_NODE_SCORE, NodeInfo, WorkloadRequest, epoch_millis};
use serde::Deserialize;

use crate::cycle_state::{CycleState, StateKey};
use crate::error::{SchedulerError, SchedulerResult};
use crate::plugin::{Capabilities, Plugin};
use crate::registry::SchedulerHandle;
use crate::status::Status;
use crate::topology::TopologyCatalog;

pub const NAME: &str = "LeastRecentlyUsedNode";

/// Epoch millis at which this cycle's scoring started.
pub const SCORING_START: StateKey<u64> = StateKey::new("LeastRecentlyUsedNode/scoring-start");

#[derive(Debug, Deserialize)]
struct LeastRecentlyUsedArgs {
    #[serde(default = "default_window_ms")]
    window_ms: u64,
}

fn default_window_ms() -> u64 {
    60_000
}

pub struct LeastRecentlyUsedNode {
    topology: Arc<TopologyCatalog>,
    window_ms: u64,
}

impl LeastRecentlyUsedNode {
    pub fn new(topology: Arc<TopologyCatalog>, window_ms: u64) -> Self {
        Self { topology, window_ms }
    }

    fn last_used(&self, node: &NodeInfo) -> Option<u64> {
        match (node.last_placement_ms, self.topology.node_last_used(&node.name)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

pub fn factory(settings: &PluginSettings, handle: &SchedulerHandle) -> SchedulerResult<Arc<dyn Plugin>> {
    let args: LeastRecentlyUsedArgs = super::parse_settings(NAME, settings)?;
    if args.window_ms == 0 {
        return Err(SchedulerError::PluginInit {
            plugin: NAME.to_string(),
            reason: "window_ms must be at least 1".to_string(),
        });
    }
    Ok(Arc::new(LeastRecentlyUsedNode::new(handle.topology.clone(), args.window_ms)))
}

impl Plugin for LeastRecentlyUsedNode {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PRE_FILTER | Capabilities::SCORE
    }

    fn pre_filter(&self, state: &mut CycleState, _request: &WorkloadRequest) -> Status {
        match state.write(&SCORING_START, epoch_millis()) {
            Ok(()) => Status::Success,
            Err(e) => Status::internal(e),
        }
    }

    fn score(&self, state: &CycleState, _request: &WorkloadRequest, node: &NodeInfo) -> Result<i64, Status> {
        let start = *state.read(&SCORING_START).map_err(Status::internal)?;
        let Some(last) = self.last_used(node) else {
            return Ok(MAX_NODE_SCORE);
        };
        let idle = start.saturating_sub(last).min(self.window_ms);
        Ok((idle as u128 * MAX_NODE_SCORE as u128 / self.window_ms as u128) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fog_core::Resources;

    fn node(name: &str) -> NodeInfo {
        NodeInfo::new(name, "r", Resources::new())
    }

    fn request() -> WorkloadRequest {
        WorkloadRequest {
            id: "r".to_string(),
            containers: Vec::new(),
            priority: 0,
            created_at_ms: 0,
            service_graph: None,
        }
    }

    fn state_at(start: u64) -> CycleState {
        let mut state = CycleState::new();
        state.write(&SCORING_START, start).unwrap();
        state
    }

    #[test]
    fn never_used_node_scores_max() {
        let plugin = LeastRecentlyUsedNode::new(Arc::new(TopologyCatalog::default()), 1_000);
        assert_eq!(plugin.score(&state_at(5_000), &request(), &node("fresh")), Ok(MAX_NODE_SCORE));
    }

    #[test]
    fn idle_time_scales_within_window() {
        let catalog = Arc::new(TopologyCatalog::default());
        catalog.mark_node_used("busy", 4_900);
        catalog.mark_node_used("idle", 4_500);
        catalog.mark_node_used("stale", 1_000);
        let plugin = LeastRecentlyUsedNode::new(catalog, 1_000);
        let state = state_at(5_000);

        assert_eq!(plugin.score(&state, &request(), &node("busy")), Ok(10));
        assert_eq!(plugin.score(&state, &request(), &node("idle")), Ok(50));
        assert_eq!(plugin.score(&state, &request(), &node("stale")), Ok(MAX_NODE_SCORE));
    }

    #[test]
    fn later_of_agent_and_scheduler_use_counts() {
        let catalog = Arc::new(TopologyCatalog::default());
        catalog.mark_node_used("n1", 4_000);
        let plugin = LeastRecentlyUsedNode::new(catalog, 1_000);
        let mut reported = node("n1");
        reported.last_placement_ms = Some(4_800);

        assert_eq!(plugin.score(&state_at(5_000), &request(), &reported), Ok(20));
        reported.last_placement_ms = Some(100);
        assert_eq!(plugin.score(&state_at(5_000), &request(), &reported), Ok(MAX_NODE_SCORE));
    }

    #[test]
    fn use_after_scoring_start_scores_zero() {
        let catalog = Arc::new(TopologyCatalog::default());
        catalog.mark_node_used("n1", 6_000);
        let plugin = LeastRecentlyUsedNode::new(catalog, 1_000);
        assert_eq!(plugin.score(&state_at(5_000), &request(), &node("n1")), Ok(0));
    }

    #[test]
    fn score_without_pre_filter_is_internal_error() {
        let plugin = LeastRecentlyUsedNode::new(Arc::new(TopologyCatalog::default()), 1_000);
        let err = plugin.score(&CycleState::new(), &request(), &node("n1")).unwrap_err();
        assert!(matches!(err, Status::InternalError(_)));
    }

    #[test]
    fn pre_filter_fixes_scoring_start() {
        let plugin = LeastRecentlyUsedNode::new(Arc::new(TopologyCatalog::default()), 1_000);
        let mut state = CycleState::new();
        assert!(plugin.pre_filter(&mut state, &request()).is_success());
        assert!(*state.read(&SCORING_START).unwrap() > 0);
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut settings = PluginSettings::new();
        settings.insert("window_ms".to_string(), toml::Value::Integer(0));
        let err = factory(&settings, &SchedulerHandle::default()).err().unwrap();
        assert!(matches!(err, SchedulerError::PluginInit { .. }));
    }
}
