//! Resource-aware sampling.
//!
//! Nodes whose allocatable resources cover the request's aggregate demand
//! are chosen first, in random order; the sample is topped up with
//! non-fitting nodes only when too few fit.

use fog_core::{NodeInfo, SampleFilter};
use rand::seq::SliceRandom;

use super::SamplingStrategy;

pub(super) const NAME: &str = "resource-aware";

pub struct ResourceAwareSampling;

impl SamplingStrategy for ResourceAwareSampling {
    fn name(&self) -> &'static str {
        NAME
    }

    fn sample(&self, population: &[NodeInfo], size: usize, filter: &SampleFilter) -> Vec<NodeInfo> {
        let amount = size.min(population.len());
        let mut rng = rand::thread_rng();

        let (mut fitting, mut rest): (Vec<usize>, Vec<usize>) = match &filter.demand {
            Some(demand) => (0..population.len())
                .partition(|&i| demand.fits_within(&population[i].allocatable)),
            None => ((0..population.len()).collect(), Vec::new()),
        };
        fitting.shuffle(&mut rng);
        rest.shuffle(&mut rng);

        fitting
            .into_iter()
            .chain(rest)
            .take(amount)
            .map(|i| population[i].clone())
            .collect()
    }
}
