//! Node sources feeding the region store, and the periodic sync loop.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use fog_core::NodeInfo;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::store::NodeStore;

/// Where an agent learns about the nodes of its region.
#[async_trait]
pub trait NodeSource: Send + Sync {
    async fn list_nodes(&self) -> anyhow::Result<Vec<NodeInfo>>;
}

/// A fixed node list, typically from `[[agent.nodes]]`.
pub struct StaticNodeSource {
    nodes: Vec<NodeInfo>,
}

impl StaticNodeSource {
    pub fn new(nodes: Vec<NodeInfo>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeSource for StaticNodeSource {
    async fn list_nodes(&self) -> anyhow::Result<Vec<NodeInfo>> {
        Ok(self.nodes.clone())
    }
}

/// A node inventory file re-read on every sync.
///
/// `.json` files hold an array of nodes; anything else is parsed as TOML
/// with a `[[nodes]]` array. Nodes without a region inherit the agent's.
pub struct InventoryFileSource {
    path: PathBuf,
    region: String,
}

#[derive(Deserialize)]
struct TomlInventory {
    #[serde(default)]
    nodes: Vec<NodeInfo>,
}

impl InventoryFileSource {
    pub fn new(path: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            region: region.into(),
        }
    }
}

#[async_trait]
impl NodeSource for InventoryFileSource {
    async fn list_nodes(&self) -> anyhow::Result<Vec<NodeInfo>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading inventory {}", self.path.display()))?;

        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let mut nodes: Vec<NodeInfo> = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str::<TomlInventory>(&content)?.nodes
        };

        for node in &mut nodes {
            if node.region.is_empty() {
                node.region = self.region.clone();
            }
        }
        Ok(nodes)
    }
}

/// Refresh `store` from `source` every `interval` until shutdown.
///
/// A failed listing keeps the previous snapshot in place.
pub async fn run_sync_loop(
    store: NodeStore,
    source: std::sync::Arc<dyn NodeSource>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval = ?interval, "node sync loop started");
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match source.list_nodes().await {
                    Ok(nodes) => {
                        let count = nodes.len();
                        let version = store.replace_all(nodes);
                        debug!(version, nodes = count, "node store refreshed");
                    }
                    Err(e) => {
                        warn!(error = %e, "node listing failed, keeping previous snapshot");
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("node sync loop shutting down");
                break;
            }
        }
    }
}
