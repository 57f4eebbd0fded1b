//! Uniform sampling without replacement.

use fog_core::{NodeInfo, SampleFilter};
use rand::seq::index;

use super::SamplingStrategy;

pub(super) const NAME: &str = "random";

pub struct RandomSampling;

impl SamplingStrategy for RandomSampling {
    fn name(&self) -> &'static str {
        NAME
    }

    fn sample(&self, population: &[NodeInfo], size: usize, _filter: &SampleFilter) -> Vec<NodeInfo> {
        let amount = size.min(population.len());
        index::sample(&mut rand::thread_rng(), population.len(), amount)
            .into_iter()
            .map(|i| population[i].clone())
            .collect()
    }
}
