//! Node sampling request/response types shared by the broker, the region
//! agents and the scheduler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::resources::Resources;
use crate::types::NodeInfo;

/// Basis points representing the whole population.
pub const FULL_BASIS_POINTS: u32 = 10_000;

/// Number of nodes to sample out of `population` for `basis_points`.
///
/// `max(1, ceil(bp / 10000 * population))`, capped at the population.
/// Zero only when the population is empty.
pub fn sample_size(basis_points: u32, population: usize) -> usize {
    if population == 0 {
        return 0;
    }
    let wanted = (u64::from(basis_points) * population as u64).div_ceil(u64::from(FULL_BASIS_POINTS));
    (wanted.max(1) as usize).min(population)
}

/// Optional criteria an agent applies before sampling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFilter {
    /// Only nodes carrying all of these labels are part of the population.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Aggregate demand of the request, used by resource-aware sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demand: Option<Resources>,
}

/// What the scheduler asks the broker for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingRequest {
    pub basis_points: u32,
    pub strategy: String,
    /// Regions to address. Empty addresses every known agent.
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub filter: SampleFilter,
}

impl SamplingRequest {
    pub fn new(basis_points: u32, strategy: impl Into<String>) -> Self {
        Self {
            basis_points,
            strategy: strategy.into(),
            regions: Vec::new(),
            filter: SampleFilter::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.basis_points > FULL_BASIS_POINTS {
            return Err(ValidationError::BasisPointsOutOfRange(self.basis_points));
        }
        Ok(())
    }

    /// Body sent to a single agent.
    pub fn to_agent_request(&self) -> AgentSampleRequest {
        AgentSampleRequest {
            basis_points: self.basis_points,
            filter: self.filter.clone(),
        }
    }
}

/// Body of `POST /samples/{strategy}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSampleRequest {
    pub basis_points: u32,
    #[serde(default)]
    pub filter: SampleFilter,
}

/// One agent's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingResponse {
    pub region: String,
    pub nodes: Vec<NodeInfo>,
}

/// Error body returned by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentErrorBody {
    pub kind: String,
    pub message: String,
}

/// Body of `GET /samples/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub status: String,
    pub region: String,
    pub nodes: usize,
}
