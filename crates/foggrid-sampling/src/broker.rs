//! Sampling broker.
//!
//! Fans a [`SamplingRequest`] out to every addressed agent concurrently,
//! each call bounded by the per-agent timeout and the whole fan-out bounded
//! by an overall deadline. Without an explicit region list a fan-out
//! addresses a random `region_basis_points` share of the agents. Failed
//! agents are dropped from the aggregate;
//! the fan-out errors only when every addressed agent failed, or when the
//! cancellation signal fires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fog_core::config::BrokerConfig;
use fog_core::{NodeInfo, SamplingRequest, SamplingResponse, sample_size};
use rand::seq::index;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::client::AgentClient;
use crate::error::{AgentError, SamplingError, SamplingResult};

/// Merged result of one fan-out.
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    /// Nodes from every answering agent, in agent order.
    pub nodes: Vec<NodeInfo>,
    /// Regions that answered.
    pub regions: Vec<String>,
    /// Agents that were dropped from the aggregate.
    pub failures: Vec<AgentError>,
}

/// Source of candidate nodes for a scheduling cycle.
#[async_trait]
pub trait NodeSampler: Send + Sync {
    async fn sample_nodes(&self, request: &SamplingRequest) -> SamplingResult<SampleSet>;
}

pub struct Broker {
    agents: Vec<Arc<dyn AgentClient>>,
    agent_timeout: Duration,
    deadline: Duration,
    max_concurrency: usize,
    region_basis_points: u32,
    cancel: Option<watch::Receiver<bool>>,
}

impl Broker {
    pub fn new(agents: Vec<Arc<dyn AgentClient>>, config: &BrokerConfig) -> Self {
        Self {
            agents,
            agent_timeout: config.agent_timeout(),
            deadline: config.deadline(),
            max_concurrency: config.max_concurrency.max(1),
            region_basis_points: config.region_basis_points,
            cancel: None,
        }
    }

    /// Abort in-flight fan-outs once `cancel` turns true.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Agents named by the request, or a uniform random subset of all
    /// agents when it names none. Agent order is preserved.
    fn addressed(&self, request: &SamplingRequest) -> Vec<Arc<dyn AgentClient>> {
        if !request.regions.is_empty() {
            return self
                .agents
                .iter()
                .filter(|a| request.regions.iter().any(|r| r == a.region()))
                .cloned()
                .collect();
        }

        let amount = sample_size(self.region_basis_points, self.agents.len());
        if amount == self.agents.len() {
            return self.agents.clone();
        }
        let mut chosen = index::sample(&mut rand::thread_rng(), self.agents.len(), amount).into_vec();
        chosen.sort_unstable();
        chosen.into_iter().map(|i| self.agents[i].clone()).collect()
    }

    pub async fn sample_nodes(&self, request: &SamplingRequest) -> SamplingResult<SampleSet> {
        request.validate()?;
        let addressed = self.addressed(request);
        if addressed.is_empty() {
            return Err(SamplingError::NoAgents);
        }

        let mut cancel = self.cancel.clone();
        if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(SamplingError::Cancelled);
        }

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let body = request.to_agent_request();
        let timeout_ms = self.agent_timeout.as_millis() as u64;
        let mut tasks = JoinSet::new();
        let mut task_slots = HashMap::with_capacity(addressed.len());

        for (idx, client) in addressed.iter().enumerate() {
            let client = client.clone();
            let permits = permits.clone();
            let body = body.clone();
            let strategy = request.strategy.clone();
            let agent_timeout = self.agent_timeout;

            let handle = tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = match tokio::time::timeout(agent_timeout, client.sample(&strategy, &body)).await {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::Timeout {
                        region: client.region().to_string(),
                        timeout_ms,
                    }),
                };
                (idx, result)
            });
            task_slots.insert(handle.id(), idx);
        }

        let mut results: Vec<Option<Result<SamplingResponse, AgentError>>> =
            (0..addressed.len()).map(|_| None).collect();
        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((_, (idx, result)))) => results[idx] = Some(result),
                    Some(Err(e)) => {
                        warn!(error = %e, "sampling task failed");
                        if let Some(&idx) = task_slots.get(&e.id()) {
                            results[idx] = Some(Err(AgentError::Unavailable {
                                region: addressed[idx].region().to_string(),
                                reason: format!("agent task failed: {e}"),
                            }));
                        }
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(deadline = ?self.deadline, outstanding = tasks.len(), "sampling deadline elapsed");
                    tasks.abort_all();
                    break;
                }
                _ = cancelled(&mut cancel) => {
                    tasks.abort_all();
                    debug!("sampling fan-out cancelled");
                    return Err(SamplingError::Cancelled);
                }
            }
        }

        let deadline_ms = self.deadline.as_millis() as u64;
        let mut set = SampleSet::default();
        for (client, result) in addressed.iter().zip(results) {
            match result {
                Some(Ok(response)) => {
                    set.regions.push(response.region);
                    set.nodes.extend(response.nodes);
                }
                Some(Err(e)) => {
                    warn!(region = %client.region(), error = %e, "agent dropped from sample");
                    set.failures.push(e);
                }
                // Still outstanding when the deadline fired.
                None => set.failures.push(AgentError::Timeout {
                    region: client.region().to_string(),
                    timeout_ms: deadline_ms,
                }),
            }
        }

        if set.regions.is_empty() {
            return Err(SamplingError::AllAgentsFailed(set.failures));
        }

        debug!(
            regions = set.regions.len(),
            failed = set.failures.len(),
            nodes = set.nodes.len(),
            "sampling fan-out complete"
        );
        Ok(set)
    }
}

#[async_trait]
impl NodeSampler for Broker {
    async fn sample_nodes(&self, request: &SamplingRequest) -> SamplingResult<SampleSet> {
        Broker::sample_nodes(self, request).await
    }
}

/// Resolves once the cancellation flag is set. Never resolves without a
/// receiver or after the sender is gone.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = cancel else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
