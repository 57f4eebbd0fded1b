//! Agent mode — serves node samples for one region.
//!
//! In this mode, the daemon:
//! 1. Builds the region's node store and the configured strategies
//! 2. Keeps the store in sync with the inventory (file or inline nodes)
//! 3. Serves `/samples/*` until Ctrl-C

use std::sync::Arc;

use anyhow::Context;
use fog_core::FogConfig;
use foggrid_sampling::{
    InventoryFileSource, NodeSource, NodeStore, RegionAgent, StaticNodeSource, StrategyRegistry, agent_router,
    run_sync_loop,
};
use tokio::sync::watch;
use tracing::info;

/// Run the region agent.
pub async fn run_agent(config: FogConfig) -> anyhow::Result<()> {
    let agent_config = config.agent;
    let region = agent_config
        .region
        .clone()
        .context("agent.region must be set in agent mode")?;
    info!(%region, "FogGrid agent starting");

    // ── Node store and sync ──────────────────────────────────────
    let source: Arc<dyn NodeSource> = match &agent_config.inventory {
        Some(path) => {
            info!(path = %path.display(), "using inventory file");
            Arc::new(InventoryFileSource::new(path.clone(), region.clone()))
        }
        None => {
            let nodes = agent_config
                .nodes
                .iter()
                .cloned()
                .map(|mut n| {
                    if n.region.is_empty() {
                        n.region = region.clone();
                    }
                    n
                })
                .collect();
            Arc::new(StaticNodeSource::new(nodes))
        }
    };

    let store = NodeStore::new();
    let initial = source.list_nodes().await.context("initial node listing")?;
    store.replace_all(initial);
    info!(nodes = store.len(), "node store loaded");

    // ── Strategies ───────────────────────────────────────────────
    let strategies = StrategyRegistry::with_defaults().build(&agent_config.strategies)?;
    info!(strategies = ?agent_config.strategies, "sampling strategies ready");

    let agent = Arc::new(RegionAgent::new(region.clone(), store.clone(), strategies));

    // ── Shutdown signal ──────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sync_handle = tokio::spawn(run_sync_loop(
        store,
        source,
        agent_config.sync_interval(),
        shutdown_rx,
    ));

    // ── HTTP server ──────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&agent_config.listen_address)
        .await
        .with_context(|| format!("binding {}", agent_config.listen_address))?;
    info!(addr = %agent_config.listen_address, "agent API listening");

    axum::serve(listener, agent_router(agent))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = sync_handle.await;
    info!(%region, "agent stopped");
    Ok(())
}
