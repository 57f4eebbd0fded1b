//! Scheduler — the worker pool around the decision pipeline.
//!
//! The `Scheduler`:
//! - Validates submissions and places them on the bounded queue
//! - Runs `workers` concurrent cycles, one request each
//! - Requeues failed cycles with a linear backoff until `max_retries`
//! - Broadcasts every terminal outcome to subscribers, including requests
//!   cancelled by shutdown while queued or backing off

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fog_core::config::SchedulerConfig;
use fog_core::{PlacementDecision, WorkloadSubmission};
use foggrid_sampling::NodeSampler;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::SchedulerResult;
use crate::pipeline::DecisionPipeline;
use crate::queue::{QueuedRequest, SchedulingQueue};
use crate::registry::PluginSet;
use crate::status::{CycleError, Status};

const OUTCOME_BUFFER: usize = 1024;

/// Terminal result for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingOutcome {
    Placed(PlacementDecision),
    /// No feasible node within the retry budget.
    Unschedulable {
        request_id: String,
        reason: String,
        attempts: u32,
    },
    /// The last cycle hit an internal error.
    Failed {
        request_id: String,
        cause: String,
        attempts: u32,
    },
    /// Abandoned before a terminal cycle: the sampling fan-out was
    /// cancelled, or the scheduler shut down while it waited.
    Cancelled { request_id: String, attempts: u32 },
}

impl SchedulingOutcome {
    pub fn request_id(&self) -> &str {
        match self {
            SchedulingOutcome::Placed(d) => &d.request_id,
            SchedulingOutcome::Unschedulable { request_id, .. }
            | SchedulingOutcome::Failed { request_id, .. }
            | SchedulingOutcome::Cancelled { request_id, .. } => request_id,
        }
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Requests waiting in the queue.
    pub queued: usize,
    /// Cycles waiting on node sampling.
    pub sampling: usize,
    /// Cycles in PreFilter through Reserve.
    pub deciding: usize,
    pub placed: u64,
    pub unschedulable: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub retried: u64,
}

struct Inner {
    queue: SchedulingQueue,
    pipeline: DecisionPipeline,
    outcomes: broadcast::Sender<SchedulingOutcome>,
    max_retries: u32,
    retry_backoff: Duration,
    /// Requests sleeping out their retry backoff.
    backoffs: Mutex<JoinSet<()>>,
    shutdown: watch::Receiver<bool>,
    placed: AtomicU64,
    unschedulable: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    retried: AtomicU64,
}

pub struct Scheduler {
    inner: Arc<Inner>,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    /// Create a scheduler. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: &SchedulerConfig,
        plugins: PluginSet,
        sampler: Arc<dyn NodeSampler>,
        strategy: impl Into<String>,
    ) -> Self {
        let plugins = Arc::new(plugins);
        let queue = SchedulingQueue::new(config.queue_capacity, plugins.sort.clone());
        let pipeline = DecisionPipeline::new(plugins, sampler, config, strategy);
        let (outcomes, _) = broadcast::channel(OUTCOME_BUFFER);
        let (shutdown_tx, shutdown) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                queue,
                pipeline,
                outcomes,
                max_retries: config.max_retries,
                retry_backoff: config.retry_backoff(),
                backoffs: Mutex::new(JoinSet::new()),
                shutdown,
                placed: AtomicU64::new(0),
                unschedulable: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                cancelled: AtomicU64::new(0),
                retried: AtomicU64::new(0),
            }),
            workers: config.workers.max(1),
            handles: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Validate and queue a request without waiting. Returns its id.
    pub fn submit(&self, submission: WorkloadSubmission) -> SchedulerResult<String> {
        let request = submission.validate()?;
        let id = request.id.clone();
        let priority = request.priority;
        self.inner.queue.try_enqueue(QueuedRequest::new(request))?;
        debug!(request_id = %id, priority, "request queued");
        Ok(id)
    }

    /// Like [`submit`](Self::submit), but waits for room in a full queue.
    pub async fn submit_wait(&self, submission: WorkloadSubmission) -> SchedulerResult<String> {
        let request = submission.validate()?;
        let id = request.id.clone();
        self.inner.queue.enqueue(QueuedRequest::new(request)).await?;
        debug!(request_id = %id, "request queued");
        Ok(id)
    }

    /// Spawn the workers. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return;
        }
        for worker in 0..self.workers {
            let inner = self.inner.clone();
            let shutdown = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(run_worker(inner, worker, shutdown)));
        }
        info!(workers = self.workers, "scheduler started");
    }

    /// Stop the workers, letting in-flight cycles finish. Requests still
    /// queued or backing off are reported as [`SchedulingOutcome::Cancelled`].
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let dropped = self.inner.queue.close();
        if !dropped.is_empty() {
            warn!(dropped = dropped.len(), "queued requests cancelled on shutdown");
        }
        for item in dropped {
            self.inner.cancel(&item.request.id, item.attempts, "scheduler shut down");
        }

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "scheduler worker panicked");
            }
        }

        // Workers are gone, so no new backoffs can start.
        let mut backoffs = std::mem::take(&mut *self.inner.backoffs.lock());
        while let Some(joined) = backoffs.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "retry backoff task panicked");
            }
        }
        info!("scheduler stopped");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulingOutcome> {
        self.inner.outcomes.subscribe()
    }

    pub fn stats(&self) -> SchedulerStats {
        let inner = &self.inner;
        SchedulerStats {
            queued: inner.queue.len(),
            sampling: inner.pipeline.in_sampling(),
            deciding: inner.pipeline.in_decision(),
            placed: inner.placed.load(Ordering::Relaxed),
            unschedulable: inner.unschedulable.load(Ordering::Relaxed),
            failed: inner.failed.load(Ordering::Relaxed),
            cancelled: inner.cancelled.load(Ordering::Relaxed),
            retried: inner.retried.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(inner: Arc<Inner>, worker: usize, mut shutdown: watch::Receiver<bool>) {
    debug!(worker, "scheduler worker started");
    loop {
        let item = tokio::select! {
            item = inner.queue.dequeue() => match item {
                Some(item) => item,
                None => break,
            },
            _ = shutdown.changed() => break,
        };
        inner.process(item).await;
    }
    debug!(worker, "scheduler worker stopped");
}

impl Inner {
    async fn process(self: &Arc<Self>, item: QueuedRequest) {
        let attempts = item.attempts + 1;
        let request = item.request.clone();

        match self.pipeline.run(&request).await {
            Ok(placement) => {
                self.placed.fetch_add(1, Ordering::Relaxed);
                info!(
                    request_id = %request.id,
                    node = %placement.node.name,
                    region = %placement.node.region,
                    score = placement.score,
                    attempts,
                    "request placed"
                );
                self.emit(SchedulingOutcome::Placed(PlacementDecision {
                    request_id: request.id.clone(),
                    node: placement.node.name,
                    region: placement.node.region,
                    score: placement.score,
                    attempts,
                }));
            }
            Err(cycle) if cycle.is_cancelled() => {
                debug!(request_id = %request.id, error = %cycle, "cycle cancelled");
                self.cancel(&request.id, attempts, "sampling cancelled");
            }
            Err(cycle) if attempts <= self.max_retries => self.retry(item, attempts, cycle),
            Err(cycle) => self.give_up(&request.id, attempts, cycle),
        }
    }

    fn retry(self: &Arc<Self>, item: QueuedRequest, attempts: u32, cycle: CycleError) {
        self.retried.fetch_add(1, Ordering::Relaxed);
        let backoff = self.retry_backoff * attempts;
        warn!(
            request_id = %item.request.id,
            attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %cycle,
            "cycle failed, requeueing"
        );

        let inner = self.clone();
        let mut shutdown = self.shutdown.clone();
        let item = QueuedRequest {
            request: item.request,
            attempts,
        };

        let mut backoffs = self.backoffs.lock();
        while backoffs.try_join_next().is_some() {}
        backoffs.spawn(async move {
            let id = item.request.id.clone();
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.wait_for(|stop| *stop) => {
                    inner.cancel(&id, attempts, "scheduler shut down during retry backoff");
                    return;
                }
            }
            if let Err(e) = inner.queue.enqueue(item).await {
                warn!(request_id = %id, error = %e, "requeue failed");
                inner.cancel(&id, attempts, "requeue failed");
            }
        });
    }

    fn give_up(&self, request_id: &str, attempts: u32, cycle: CycleError) {
        let outcome = match cycle.status {
            Status::InternalError(cause) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    request_id,
                    attempts,
                    stage = %cycle.stage,
                    plugin = cycle.plugin.as_deref().unwrap_or("-"),
                    %cause,
                    "placement failed"
                );
                SchedulingOutcome::Failed {
                    request_id: request_id.to_string(),
                    cause,
                    attempts,
                }
            }
            other => {
                let reason = other.reason().unwrap_or("no placement").to_string();
                self.unschedulable.fetch_add(1, Ordering::Relaxed);
                warn!(request_id, attempts, stage = %cycle.stage, %reason, "request unschedulable");
                SchedulingOutcome::Unschedulable {
                    request_id: request_id.to_string(),
                    reason,
                    attempts,
                }
            }
        };
        self.emit(outcome);
    }

    fn cancel(&self, request_id: &str, attempts: u32, reason: &str) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
        warn!(request_id, attempts, reason, "request cancelled");
        self.emit(SchedulingOutcome::Cancelled {
            request_id: request_id.to_string(),
            attempts,
        });
    }

    fn emit(&self, outcome: SchedulingOutcome) {
        // No subscribers is fine.
        let _ = self.outcomes.send(outcome);
    }
}
