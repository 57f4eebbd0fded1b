//! Region agent — serves node samples for one region.

use std::collections::HashMap;
use std::sync::Arc;

use fog_core::{AgentSampleRequest, AgentStatus, NodeInfo, SamplingResponse, ValidationError, sample_size};
use tracing::debug;

use crate::error::SampleError;
use crate::store::NodeStore;
use crate::strategy::SamplingStrategy;

pub struct RegionAgent {
    region: String,
    store: NodeStore,
    strategies: HashMap<String, Arc<dyn SamplingStrategy>>,
}

impl RegionAgent {
    pub fn new(
        region: impl Into<String>,
        store: NodeStore,
        strategies: HashMap<String, Arc<dyn SamplingStrategy>>,
    ) -> Self {
        Self {
            region: region.into(),
            store,
            strategies,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Sample the region's nodes with the named strategy.
    ///
    /// The population is the current snapshot restricted to nodes matching
    /// the filter's labels; its size drives the sample size.
    pub fn sample(&self, strategy: &str, request: &AgentSampleRequest) -> Result<SamplingResponse, SampleError> {
        if request.basis_points > fog_core::FULL_BASIS_POINTS {
            return Err(ValidationError::BasisPointsOutOfRange(request.basis_points).into());
        }
        let strategy_impl = self
            .strategies
            .get(strategy)
            .ok_or_else(|| SampleError::UnknownStrategy(strategy.to_string()))?;

        let snapshot = self.store.snapshot();
        let population: Vec<NodeInfo>;
        let candidates: &[NodeInfo] = if request.filter.labels.is_empty() {
            &snapshot.nodes
        } else {
            population = snapshot
                .nodes
                .iter()
                .filter(|n| n.matches_labels(&request.filter.labels))
                .cloned()
                .collect();
            &population
        };

        let size = sample_size(request.basis_points, candidates.len());
        let nodes = strategy_impl.sample(candidates, size, &request.filter);

        debug!(
            region = %self.region,
            strategy,
            population = candidates.len(),
            sampled = nodes.len(),
            version = snapshot.version,
            "served node sample"
        );

        Ok(SamplingResponse {
            region: self.region.clone(),
            nodes,
        })
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            status: "ok".to_string(),
            region: self.region.clone(),
            nodes: self.store.len(),
        }
    }
}
