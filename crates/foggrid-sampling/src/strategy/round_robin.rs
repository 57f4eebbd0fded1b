//! Round-robin sampling.
//!
//! A shared cursor advances by the sample size on every call, so
//! consecutive windows are contiguous and `ceil(P / w)` calls cover a
//! population of `P` nodes. The cursor is an atomic counter; concurrent
//! callers receive disjoint windows.

use std::sync::atomic::{AtomicUsize, Ordering};

use fog_core::{NodeInfo, SampleFilter};

use super::SamplingStrategy;

pub(super) const NAME: &str = "round-robin";

pub struct RoundRobinSampling {
    cursor: AtomicUsize,
}

impl RoundRobinSampling {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }

    /// Current cursor value (for diagnostics).
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl Default for RoundRobinSampling {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingStrategy for RoundRobinSampling {
    fn name(&self) -> &'static str {
        NAME
    }

    fn sample(&self, population: &[NodeInfo], size: usize, _filter: &SampleFilter) -> Vec<NodeInfo> {
        let len = population.len();
        let amount = size.min(len);
        if amount == 0 {
            return Vec::new();
        }
        let start = self.cursor.fetch_add(amount, Ordering::Relaxed) % len;
        (0..amount)
            .map(|i| population[(start + i) % len].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::strategy::test_support::population;

    fn names(nodes: &[NodeInfo]) -> Vec<String> {
        nodes.iter().map(|n| n.name.clone()).collect()
    }

    #[test]
    fn windows_wrap_around() {
        let rr = RoundRobinSampling::new();
        let pop = population(5);
        let f = SampleFilter::default();

        assert_eq!(names(&rr.sample(&pop, 2, &f)), vec!["node-000", "node-001"]);
        assert_eq!(names(&rr.sample(&pop, 2, &f)), vec!["node-002", "node-003"]);
        assert_eq!(names(&rr.sample(&pop, 2, &f)), vec!["node-004", "node-000"]);
    }

    #[test]
    fn coverage_in_ceil_p_over_w_calls() {
        for p in 1..40usize {
            for w in 1..=p {
                let rr = RoundRobinSampling::new();
                let pop = population(p);
                let mut seen = HashSet::new();
                for _ in 0..p.div_ceil(w) {
                    for n in rr.sample(&pop, w, &SampleFilter::default()) {
                        seen.insert(n.name);
                    }
                }
                assert_eq!(seen.len(), p, "p={p} w={w}");
            }
        }
    }

    #[test]
    fn consecutive_starts_differ() {
        let pop = population(13);
        for w in 1..13 {
            let rr = RoundRobinSampling::new();
            let mut prev: Option<String> = None;
            for _ in 0..30 {
                let first = rr.sample(&pop, w, &SampleFilter::default())[0].name.clone();
                assert_ne!(prev.as_ref(), Some(&first), "w={w}");
                prev = Some(first);
            }
        }
    }

    #[test]
    fn empty_population() {
        let rr = RoundRobinSampling::new();
        assert!(rr.sample(&[], 3, &SampleFilter::default()).is_empty());
        assert_eq!(rr.cursor(), 0);
    }

    #[test]
    fn concurrent_windows_are_disjoint() {
        use std::thread;

        let rr = Arc::new(RoundRobinSampling::new());
        let pop = Arc::new(population(400));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rr = rr.clone();
                let pop = pop.clone();
                thread::spawn(move || {
                    (0..10)
                        .flat_map(|_| names(&rr.sample(&pop, 10, &SampleFilter::default())))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            for name in h.join().unwrap() {
                assert!(all.insert(name));
            }
        }
        assert_eq!(all.len(), 400);
        assert_eq!(rr.cursor(), 400);
    }
}
