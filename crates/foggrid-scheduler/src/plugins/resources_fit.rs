//! ResourcesFit — requested-vs-allocatable filtering and utilization scoring.
//!
//! PreFilter sums every container's limits once per cycle; Filter rejects
//! nodes where any requested dimension exceeds allocatable; Score rates the
//! node's utilization after placement, averaged over cpu, memory and any
//! other requested dimension the node reports capacity for.

use std::sync::Arc;

use fog_core::config::PluginSettings;
use fog_core::resources::{CPU, MEMORY};
use fog_core::{MAX_NODE_SCORE, NodeInfo, Resources, WorkloadRequest};
use serde::Deserialize;

use crate::cycle_state::{CycleState, StateKey};
use crate::error::SchedulerResult;
use crate::plugin::{Capabilities, Plugin};
use crate::registry::SchedulerHandle;
use crate::status::Status;

pub const NAME: &str = "ResourcesFit";

/// Aggregate demand computed by PreFilter.
pub const DEMAND: StateKey<Resources> = StateKey::new("ResourcesFit/demand");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ScoringMode {
    /// Prefer emptier nodes (spread).
    #[default]
    LeastAllocated,
    /// Prefer fuller nodes (bin-packing).
    MostAllocated,
}

#[derive(Debug, Default, Deserialize)]
struct ResourcesFitArgs {
    #[serde(default)]
    scoring_mode: ScoringMode,
}

#[derive(Debug, Default)]
pub struct ResourcesFit {
    mode: ScoringMode,
}

impl ResourcesFit {
    pub fn new(mode: ScoringMode) -> Self {
        Self { mode }
    }
}

pub fn factory(settings: &PluginSettings, _handle: &SchedulerHandle) -> SchedulerResult<Arc<dyn Plugin>> {
    let args: ResourcesFitArgs = super::parse_settings(NAME, settings)?;
    Ok(Arc::new(ResourcesFit::new(args.scoring_mode)))
}

impl Plugin for ResourcesFit {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PRE_FILTER | Capabilities::FILTER | Capabilities::SCORE
    }

    fn pre_filter(&self, state: &mut CycleState, request: &WorkloadRequest) -> Status {
        match state.write(&DEMAND, request.total_limits()) {
            Ok(()) => Status::Success,
            Err(e) => Status::internal(e),
        }
    }

    fn filter(&self, state: &CycleState, _request: &WorkloadRequest, node: &NodeInfo) -> Status {
        let demand = match state.read(&DEMAND) {
            Ok(d) => d,
            Err(e) => return Status::internal(e),
        };
        match demand.first_shortfall(&node.allocatable) {
            None => Status::Success,
            Some(s) => Status::unschedulable(format!(
                "insufficient {}: requested {}, allocatable {}",
                s.dimension, s.requested, s.available
            )),
        }
    }

    fn score(&self, state: &CycleState, _request: &WorkloadRequest, node: &NodeInfo) -> Result<i64, Status> {
        let demand = state.read(&DEMAND).map_err(Status::internal)?;
        let capacity = node.effective_capacity();

        let mut dims: Vec<&str> = vec![CPU, MEMORY];
        dims.extend(demand.dimensions().filter(|d| *d != CPU && *d != MEMORY));

        let fractions: Vec<f64> = dims
            .iter()
            .filter_map(|dim| capacity.used_fraction(&node.allocatable, demand, dim))
            .collect();
        if fractions.is_empty() {
            return Ok(0);
        }
        let used = fractions.iter().sum::<f64>() / fractions.len() as f64;

        let score = match self.mode {
            ScoringMode::LeastAllocated => (1.0 - used) * MAX_NODE_SCORE as f64,
            ScoringMode::MostAllocated => used * MAX_NODE_SCORE as f64,
        };
        Ok(score.round() as i64)
    }
}
