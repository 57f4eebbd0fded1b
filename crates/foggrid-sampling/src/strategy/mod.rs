//! Pluggable sampling strategies.
//!
//! A strategy picks `size` nodes out of an already label-filtered
//! population. Strategies are shared across concurrent requests; any
//! mutable state they keep must be synchronized internally.

mod random;
mod resource_aware;
mod round_robin;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use fog_core::{NodeInfo, SampleFilter};

use crate::error::{SamplingError, SamplingResult};

pub use random::RandomSampling;
pub use resource_aware::ResourceAwareSampling;
pub use round_robin::RoundRobinSampling;

pub trait SamplingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Choose exactly `min(size, population.len())` distinct nodes.
    fn sample(&self, population: &[NodeInfo], size: usize, filter: &SampleFilter) -> Vec<NodeInfo>;
}

pub type StrategyFactory = fn() -> Arc<dyn SamplingStrategy>;

/// Name → factory table, resolved once at agent startup.
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with `random`, `round-robin` and `resource-aware`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(random::NAME, || Arc::new(RandomSampling));
        registry.register(round_robin::NAME, || Arc::new(RoundRobinSampling::new()));
        registry.register(resource_aware::NAME, || Arc::new(ResourceAwareSampling));
        registry
    }

    pub fn register(&mut self, name: &str, factory: StrategyFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate the named strategies. An unknown name is an error.
    pub fn build(&self, names: &[String]) -> SamplingResult<HashMap<String, Arc<dyn SamplingStrategy>>> {
        names
            .iter()
            .map(|name| {
                let factory = self
                    .factories
                    .get(name)
                    .ok_or_else(|| SamplingError::UnknownStrategy(name.clone()))?;
                Ok((name.clone(), factory()))
            })
            .collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
