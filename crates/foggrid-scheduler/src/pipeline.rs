//! Decision pipeline — one scheduling cycle for one request.
//!
//! Sample → PreFilter → Filter → Score → Reserve, strictly in that order.
//! PreFilter runs sequentially with exclusive access to the cycle state;
//! Filter and Score fan out over the candidate nodes on a bounded pool and
//! only read it; Reserve runs once, for the winner, after every score is in.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fog_core::config::SchedulerConfig;
use fog_core::{NodeInfo, SamplingRequest, WorkloadRequest};
use foggrid_sampling::{NodeSampler, SamplingError};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cycle_state::CycleState;
use crate::registry::PluginSet;
use crate::score::{combine_scores, normalize_scores, select_best};
use crate::status::{CycleError, Stage, Status};

/// Result of a successful cycle.
#[derive(Debug, Clone)]
pub struct Placement {
    pub node: NodeInfo,
    /// Combined weighted score of the winner.
    pub score: i64,
    /// Nodes returned by sampling.
    pub sampled: usize,
    /// Nodes that passed every Filter plugin.
    pub feasible: usize,
}

/// Keeps an in-flight gauge raised for as long as it lives.
struct Gauge<'a>(&'a AtomicUsize);

impl<'a> Gauge<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for Gauge<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Marks a request as being reserved; cleared on drop.
struct ReserveGuard<'a> {
    reserving: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for ReserveGuard<'_> {
    fn drop(&mut self) {
        self.reserving.lock().remove(&self.id);
    }
}

pub struct DecisionPipeline {
    plugins: Arc<PluginSet>,
    sampler: Arc<dyn NodeSampler>,
    sample_basis_points: u32,
    strategy: String,
    node_parallelism: usize,
    reserving: Mutex<HashSet<String>>,
    sampling: AtomicUsize,
    deciding: AtomicUsize,
}

impl DecisionPipeline {
    pub fn new(
        plugins: Arc<PluginSet>,
        sampler: Arc<dyn NodeSampler>,
        config: &SchedulerConfig,
        strategy: impl Into<String>,
    ) -> Self {
        Self {
            plugins,
            sampler,
            sample_basis_points: config.sample_basis_points,
            strategy: strategy.into(),
            node_parallelism: config.node_parallelism.max(1),
            reserving: Mutex::new(HashSet::new()),
            sampling: AtomicUsize::new(0),
            deciding: AtomicUsize::new(0),
        }
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    /// Cycles currently waiting on the sampler.
    pub fn in_sampling(&self) -> usize {
        self.sampling.load(Ordering::Relaxed)
    }

    /// Cycles currently between PreFilter and the end of Reserve.
    pub fn in_decision(&self) -> usize {
        self.deciding.load(Ordering::Relaxed)
    }

    /// Run one full cycle for `request`.
    pub async fn run(&self, request: &Arc<WorkloadRequest>) -> Result<Placement, CycleError> {
        let nodes = {
            let _gauge = Gauge::enter(&self.sampling);
            self.sample(request).await?
        };
        let _gauge = Gauge::enter(&self.deciding);
        let sampled = nodes.len();

        let mut state = CycleState::new();
        for plugin in &self.plugins.pre_filter {
            let status = plugin.pre_filter(&mut state, request);
            if !status.is_success() {
                return Err(CycleError::new(Stage::PreFilter, Some(plugin.name()), status));
            }
        }

        let state = Arc::new(state);
        let nodes = Arc::new(nodes);

        let survivors = self.filter(request, &state, &nodes).await?;
        let (best, score) = self.score(request, &state, &nodes, &survivors).await?;
        let winner = nodes[best].clone();

        // Every Filter/Score task has been joined, so this is the last handle.
        let mut state = Arc::try_unwrap(state).unwrap_or_else(|shared| (*shared).clone());
        self.reserve(&mut state, request, &winner)?;

        debug!(
            request_id = %request.id,
            node = %winner.name,
            score,
            sampled,
            feasible = survivors.len(),
            "cycle complete"
        );
        Ok(Placement {
            node: winner,
            score,
            sampled,
            feasible: survivors.len(),
        })
    }

    async fn sample(&self, request: &WorkloadRequest) -> Result<Vec<NodeInfo>, CycleError> {
        let mut sampling = SamplingRequest::new(self.sample_basis_points, self.strategy.clone());
        sampling.filter.demand = Some(request.total_limits());

        let set = self
            .sampler
            .sample_nodes(&sampling)
            .await
            .map_err(|e| match e {
                SamplingError::Cancelled => CycleError::cancelled(Stage::Sample),
                e => CycleError::new(Stage::Sample, None, Status::internal(e)),
            })?;
        if set.nodes.is_empty() {
            return Err(CycleError::new(
                Stage::Sample,
                None,
                Status::unschedulable("no candidate nodes sampled"),
            ));
        }
        debug!(
            request_id = %request.id,
            nodes = set.nodes.len(),
            regions = set.regions.len(),
            failed_agents = set.failures.len(),
            "nodes sampled"
        );
        Ok(set.nodes)
    }

    /// Indices of the nodes that pass every Filter plugin, in sample order.
    async fn filter(
        &self,
        request: &Arc<WorkloadRequest>,
        state: &Arc<CycleState>,
        nodes: &Arc<Vec<NodeInfo>>,
    ) -> Result<Vec<usize>, CycleError> {
        let permits = Arc::new(Semaphore::new(self.node_parallelism));
        let mut tasks = JoinSet::new();

        for idx in 0..nodes.len() {
            let plugins = self.plugins.clone();
            let state = state.clone();
            let nodes = nodes.clone();
            let request = request.clone();
            let permits = permits.clone();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let node = &nodes[idx];
                for plugin in &plugins.filter {
                    let status = plugin.filter(&state, &request, node);
                    if !status.is_success() {
                        return (idx, Some((plugin.name().to_string(), status)));
                    }
                }
                (idx, None)
            });
        }

        let mut passed = vec![false; nodes.len()];
        let mut rejections: BTreeMap<String, usize> = BTreeMap::new();

        while let Some(joined) = tasks.join_next().await {
            let (idx, rejection) =
                joined.map_err(|e| CycleError::new(Stage::Filter, None, Status::internal(e)))?;
            match rejection {
                None => passed[idx] = true,
                Some((plugin, status @ Status::InternalError(_))) => {
                    tasks.abort_all();
                    return Err(CycleError::new(Stage::Filter, Some(&plugin), status));
                }
                Some((plugin, status)) => {
                    debug!(
                        request_id = %request.id,
                        node = %nodes[idx].name,
                        plugin = %plugin,
                        reason = status.reason().unwrap_or_default(),
                        "node filtered out"
                    );
                    let reason = format!("{plugin}: {}", status.reason().unwrap_or_default());
                    *rejections.entry(reason).or_default() += 1;
                }
            }
        }

        let survivors: Vec<usize> = (0..nodes.len()).filter(|&i| passed[i]).collect();
        if survivors.is_empty() {
            let reasons = rejections
                .iter()
                .map(|(reason, count)| format!("{count} node(s) {reason}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CycleError::new(
                Stage::Filter,
                None,
                Status::unschedulable(format!("0/{} nodes feasible ({reasons})", nodes.len())),
            ));
        }
        Ok(survivors)
    }

    /// Pick the best survivor. Returns its index into `nodes` and its
    /// combined score.
    async fn score(
        &self,
        request: &Arc<WorkloadRequest>,
        state: &Arc<CycleState>,
        nodes: &Arc<Vec<NodeInfo>>,
        survivors: &[usize],
    ) -> Result<(usize, i64), CycleError> {
        let permits = Arc::new(Semaphore::new(self.node_parallelism));
        let mut tasks = JoinSet::new();

        for (pos, &idx) in survivors.iter().enumerate() {
            let plugins = self.plugins.clone();
            let state = state.clone();
            let nodes = nodes.clone();
            let request = request.clone();
            let permits = permits.clone();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let node = &nodes[idx];
                let mut raw = Vec::with_capacity(plugins.score.len());
                for weighted in &plugins.score {
                    match weighted.plugin.score(&state, &request, node) {
                        Ok(s) => raw.push(s),
                        Err(status) => return (pos, Err((weighted.plugin.name().to_string(), status))),
                    }
                }
                (pos, Ok(raw))
            });
        }

        // per_plugin[p][pos]
        let mut per_plugin = vec![vec![0i64; survivors.len()]; self.plugins.score.len()];
        while let Some(joined) = tasks.join_next().await {
            let (pos, raw) = joined.map_err(|e| CycleError::new(Stage::Score, None, Status::internal(e)))?;
            match raw {
                Ok(raw) => {
                    for (p, s) in raw.into_iter().enumerate() {
                        per_plugin[p][pos] = s;
                    }
                }
                Err((plugin, status)) => {
                    tasks.abort_all();
                    return Err(CycleError::new(Stage::Score, Some(&plugin), status));
                }
            }
        }

        let weighted: Vec<(i64, Vec<i64>)> = self
            .plugins
            .score
            .iter()
            .zip(per_plugin)
            .map(|(w, mut scores)| {
                normalize_scores(&mut scores);
                (w.weight, scores)
            })
            .collect();
        let totals = combine_scores(&weighted, survivors.len());

        let best = select_best(&totals).ok_or_else(|| {
            CycleError::new(Stage::Score, None, Status::internal("no survivors to rank"))
        })?;
        Ok((survivors[best], totals[best]))
    }

    fn reserve(&self, state: &mut CycleState, request: &WorkloadRequest, node: &NodeInfo) -> Result<(), CycleError> {
        if !self.reserving.lock().insert(request.id.clone()) {
            return Err(CycleError::new(
                Stage::Reserve,
                None,
                Status::internal(format!("request {} is already being reserved", request.id)),
            ));
        }
        let _guard = ReserveGuard {
            reserving: &self.reserving,
            id: request.id.clone(),
        };

        for plugin in &self.plugins.reserve {
            let status = plugin.reserve(state, request, node);
            if !status.is_success() {
                warn!(
                    request_id = %request.id,
                    node = %node.name,
                    plugin = plugin.name(),
                    %status,
                    "reserve failed, rolling back"
                );
                for p in &self.plugins.reserve {
                    p.unreserve(state, request, node);
                }
                return Err(CycleError::new(Stage::Reserve, Some(plugin.name()), status));
            }
        }
        Ok(())
    }
}
