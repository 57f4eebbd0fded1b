//! fog.toml configuration parser.
//!
//! Every table and field is optional; omitted values take the defaults
//! documented on each field.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::qos::{LinkQosRequirements, NetworkLinkQos};
use crate::sampling::FULL_BASIS_POINTS;
use crate::types::NodeInfo;

/// Free-form settings table handed to a plugin factory.
pub type PluginSettings = toml::Table;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FogConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
}

// ── Scheduler ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Share of each region's nodes to sample, in basis points. Default 200.
    #[serde(default = "default_sample_basis_points")]
    pub sample_basis_points: u32,
    /// Concurrent scheduling workers. Default 4.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bound on concurrent Filter/Score evaluations within one cycle. Default 16.
    #[serde(default = "default_node_parallelism")]
    pub node_parallelism: usize,
    /// Pending queue bound. Default 1000.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Requeues allowed after a failed cycle before the request is given up. Default 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before a failed request is requeued. Default 500ms.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Submission API address in scheduler mode. Default `0.0.0.0:8080`.
    #[serde(default = "default_scheduler_listen_address")]
    pub listen_address: String,
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// Per-plugin settings keyed by plugin name.
    #[serde(default)]
    pub plugin_config: BTreeMap<String, PluginSettings>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sample_basis_points: default_sample_basis_points(),
            workers: default_workers(),
            node_parallelism: default_node_parallelism(),
            queue_capacity: default_queue_capacity(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            listen_address: default_scheduler_listen_address(),
            plugins: PluginsConfig::default(),
            plugin_config: BTreeMap::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn settings_for(&self, plugin: &str) -> PluginSettings {
        self.plugin_config.get(plugin).cloned().unwrap_or_default()
    }
}

/// Enabled plugins per stage, in invocation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default = "default_sort_plugin")]
    pub sort: String,
    #[serde(default = "default_stage_plugins")]
    pub pre_filter: Vec<String>,
    #[serde(default = "default_stage_plugins")]
    pub filter: Vec<String>,
    #[serde(default = "default_score_plugins")]
    pub score: Vec<ScorePluginEntry>,
    #[serde(default = "default_reserve_plugins")]
    pub reserve: Vec<String>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            sort: default_sort_plugin(),
            pre_filter: default_stage_plugins(),
            filter: default_stage_plugins(),
            score: default_score_plugins(),
            reserve: default_reserve_plugins(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePluginEntry {
    pub name: String,
    /// Multiplier applied to the plugin's normalized score. Default 1.
    #[serde(default = "default_weight")]
    pub weight: i64,
}

// ── Broker ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Sampling strategy requested from agents. Default `random`.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Per-agent call timeout. Default 1000ms.
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
    /// Overall fan-out deadline. Default 3000ms.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Maximum agent calls in flight for one fan-out. Default 16.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Share of agents addressed by a fan-out without an explicit region
    /// list, in basis points. At least one agent is always chosen. Default
    /// 10000 (every agent).
    #[serde(default = "default_region_basis_points")]
    pub region_basis_points: u32,
    /// Region name to agent `host:port`.
    #[serde(default)]
    pub agents: BTreeMap<String, String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            agent_timeout_ms: default_agent_timeout_ms(),
            deadline_ms: default_deadline_ms(),
            max_concurrency: default_max_concurrency(),
            region_basis_points: default_region_basis_points(),
            agents: BTreeMap::new(),
        }
    }
}

impl BrokerConfig {
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Region served by this agent. Required in agent mode.
    #[serde(default)]
    pub region: Option<String>,
    /// Default `0.0.0.0:8081`.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Node store refresh interval. Default 200ms.
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,
    /// Sampling strategies served. Default: all built-ins.
    #[serde(default = "default_agent_strategies")]
    pub strategies: Vec<String>,
    /// JSON or TOML node inventory reloaded every sync interval.
    #[serde(default)]
    pub inventory: Option<PathBuf>,
    /// Static nodes, used when no inventory file is set.
    #[serde(default)]
    pub nodes: Vec<NodeInfo>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            region: None,
            listen_address: default_listen_address(),
            sync_interval_ms: default_sync_interval_ms(),
            strategies: default_agent_strategies(),
            inventory: None,
            nodes: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}

// ── Topology ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Region-graph vertices (cluster node names).
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub region_head: Option<String>,
    #[serde(default)]
    pub links: Vec<RegionLinkConfig>,
    #[serde(default)]
    pub service_graphs: Vec<ServiceGraphConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionLinkConfig {
    pub from: String,
    pub to: String,
    pub qos: NetworkLinkQos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceGraphConfig {
    pub name: String,
    /// Maximum delay between any member's node and the region head.
    #[serde(default)]
    pub max_delay_ms: Option<u32>,
    pub services: Vec<String>,
    #[serde(default)]
    pub links: Vec<ServiceLinkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLinkConfig {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub qos: LinkQosRequirements,
}

// ── Defaults ───────────────────────────────────────────────────

fn default_sample_basis_points() -> u32 {
    200
}
fn default_workers() -> usize {
    4
}
fn default_node_parallelism() -> usize {
    16
}
fn default_queue_capacity() -> usize {
    1000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_scheduler_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_sort_plugin() -> String {
    "PrioritySort".to_string()
}
fn default_stage_plugins() -> Vec<String> {
    vec!["ResourcesFit".to_string()]
}
fn default_score_plugins() -> Vec<ScorePluginEntry> {
    vec![ScorePluginEntry {
        name: "ResourcesFit".to_string(),
        weight: default_weight(),
    }]
}
fn default_reserve_plugins() -> Vec<String> {
    vec!["PlacementRecorder".to_string()]
}
fn default_weight() -> i64 {
    1
}
fn default_strategy() -> String {
    "random".to_string()
}
fn default_agent_timeout_ms() -> u64 {
    1000
}
fn default_deadline_ms() -> u64 {
    3000
}
fn default_max_concurrency() -> usize {
    16
}
fn default_region_basis_points() -> u32 {
    FULL_BASIS_POINTS
}
fn default_listen_address() -> String {
    "0.0.0.0:8081".to_string()
}
fn default_sync_interval_ms() -> u64 {
    200
}
fn default_agent_strategies() -> Vec<String> {
    ["random", "round-robin", "resource-aware"]
        .into_iter()
        .map(String::from)
        .collect()
}

// ── Loading ────────────────────────────────────────────────────

impl FogConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: FogConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check ranges and stage lists. Plugin names are resolved later by the
    /// scheduler's registry.
    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.scheduler;
        if s.sample_basis_points > FULL_BASIS_POINTS {
            bail!(
                "scheduler.sample_basis_points must be within 0..={FULL_BASIS_POINTS}, got {}",
                s.sample_basis_points
            );
        }
        if s.workers == 0 {
            bail!("scheduler.workers must be at least 1");
        }
        if s.node_parallelism == 0 {
            bail!("scheduler.node_parallelism must be at least 1");
        }
        if s.queue_capacity == 0 {
            bail!("scheduler.queue_capacity must be at least 1");
        }
        if s.plugins.sort.is_empty() {
            bail!("scheduler.plugins.sort must name a plugin");
        }

        let stages: [(&str, Vec<&str>); 4] = [
            ("pre_filter", s.plugins.pre_filter.iter().map(String::as_str).collect()),
            ("filter", s.plugins.filter.iter().map(String::as_str).collect()),
            ("score", s.plugins.score.iter().map(|e| e.name.as_str()).collect()),
            ("reserve", s.plugins.reserve.iter().map(String::as_str).collect()),
        ];
        for (stage, names) in &stages {
            let mut seen = HashSet::new();
            for name in names {
                if !seen.insert(*name) {
                    bail!("plugin {name} listed twice in scheduler.plugins.{stage}");
                }
            }
        }
        if let Some(bad) = s.plugins.score.iter().find(|e| e.weight < 0) {
            bail!("score plugin {} has negative weight {}", bad.name, bad.weight);
        }

        if self.broker.max_concurrency == 0 {
            bail!("broker.max_concurrency must be at least 1");
        }
        if self.broker.region_basis_points > FULL_BASIS_POINTS {
            bail!(
                "broker.region_basis_points must be within 0..={FULL_BASIS_POINTS}, got {}",
                self.broker.region_basis_points
            );
        }
        Ok(())
    }
}
