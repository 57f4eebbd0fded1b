//! Scheduler mode — broker, decision pipeline and submission API.
//!
//! In this mode, the daemon:
//! 1. Connects a broker to every agent in `[broker.agents]`
//! 2. Loads the topology catalog and resolves the configured plugins
//! 3. Starts the scheduler workers and the submission API
//! 4. Optionally submits a batch of workloads from a JSON file
//! 5. Runs until Ctrl-C, or with `--once` until the batch is resolved

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use fog_core::{FogConfig, WorkloadSubmission};
use foggrid_sampling::{AgentClient, Broker, HttpAgentClient};
use foggrid_scheduler::{PluginRegistry, PluginSet, Scheduler, SchedulerHandle, SchedulingOutcome, TopologyCatalog};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::api::scheduler_router;

/// Run the scheduler.
pub async fn run_scheduler(config: FogConfig, workloads: Option<PathBuf>, once: bool) -> anyhow::Result<()> {
    info!("FogGrid scheduler starting");

    // ── Broker ───────────────────────────────────────────────────
    if config.broker.agents.is_empty() {
        bail!("broker.agents is empty; no region can be sampled");
    }
    let agents: Vec<Arc<dyn AgentClient>> = config
        .broker
        .agents
        .iter()
        .map(|(region, addr)| Arc::new(HttpAgentClient::new(region.clone(), addr.clone())) as Arc<dyn AgentClient>)
        .collect();
    for client in &agents {
        info!(region = client.region(), "agent registered");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let broker = Broker::new(agents, &config.broker).with_cancellation(shutdown_rx.clone());

    // ── Topology and plugins ─────────────────────────────────────
    let catalog = Arc::new(TopologyCatalog::from_config(&config.topology)?);
    let plugins = PluginSet::build(
        &PluginRegistry::with_defaults(),
        &config.scheduler,
        &SchedulerHandle::new(catalog),
    )?;
    info!(
        sort = plugins.sort.name(),
        filter = plugins.filter.len(),
        score = plugins.score.len(),
        reserve = plugins.reserve.len(),
        "plugins resolved"
    );

    // ── Scheduler ────────────────────────────────────────────────
    let scheduler = Arc::new(Scheduler::new(
        &config.scheduler,
        plugins,
        Arc::new(broker),
        config.broker.strategy.clone(),
    ));
    let outcomes = scheduler.subscribe();
    scheduler.start();

    let pending = match &workloads {
        Some(path) => submit_batch(&scheduler, path).await?,
        None => HashSet::new(),
    };
    let batch_handle = once.then(|| tokio::spawn(await_batch(outcomes, pending, shutdown_tx.clone())));

    // ── Submission API ───────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.scheduler.listen_address)
        .await
        .with_context(|| format!("binding {}", config.scheduler.listen_address))?;
    info!(addr = %config.scheduler.listen_address, "submission API listening");

    let mut server_shutdown = shutdown_rx.clone();
    axum::serve(listener, scheduler_router(scheduler.clone()))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    let _ = shutdown_tx.send(true);
                }
                _ = server_shutdown.changed() => {}
            }
        })
        .await?;

    scheduler.shutdown().await;
    if let Some(handle) = batch_handle {
        handle.abort();
    }

    let stats = scheduler.stats();
    info!(
        placed = stats.placed,
        unschedulable = stats.unschedulable,
        failed = stats.failed,
        cancelled = stats.cancelled,
        "scheduler stopped"
    );
    Ok(())
}

async fn submit_batch(scheduler: &Scheduler, path: &Path) -> anyhow::Result<HashSet<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading workloads {}", path.display()))?;
    let batch: Vec<WorkloadSubmission> =
        serde_json::from_str(&content).with_context(|| format!("parsing workloads {}", path.display()))?;

    let mut pending = HashSet::new();
    for submission in batch {
        let id = submission.id.clone();
        match scheduler.submit_wait(submission).await {
            Ok(id) => {
                pending.insert(id);
            }
            Err(e) => warn!(request_id = %id, error = %e, "workload rejected"),
        }
    }
    info!(submitted = pending.len(), "workload batch queued");
    Ok(pending)
}

/// Trigger shutdown once every request in `pending` has an outcome.
async fn await_batch(
    mut outcomes: broadcast::Receiver<SchedulingOutcome>,
    mut pending: HashSet<String>,
    shutdown_tx: Arc<watch::Sender<bool>>,
) {
    if pending.is_empty() {
        let _ = shutdown_tx.send(true);
        return;
    }
    loop {
        match outcomes.recv().await {
            Ok(outcome) => {
                pending.remove(outcome.request_id());
                if pending.is_empty() {
                    info!("all workloads resolved");
                    let _ = shutdown_tx.send(true);
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "outcome stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
