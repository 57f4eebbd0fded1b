//! Plugin registry and per-stage plugin lists.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use fog_core::config::{PluginSettings, SchedulerConfig};
use tracing::debug;

use crate::error::{SchedulerError, SchedulerResult};
use crate::plugin::{Capabilities, Plugin};
use crate::plugins;
use crate::status::Stage;
use crate::topology::TopologyCatalog;

/// What a plugin factory may reach besides its own settings.
#[derive(Clone, Default)]
pub struct SchedulerHandle {
    pub topology: Arc<TopologyCatalog>,
}

impl SchedulerHandle {
    pub fn new(topology: Arc<TopologyCatalog>) -> Self {
        Self { topology }
    }
}

pub type PluginFactory =
    Arc<dyn Fn(&PluginSettings, &SchedulerHandle) -> SchedulerResult<Arc<dyn Plugin>> + Send + Sync>;

pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in plugin.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(plugins::priority_sort::NAME, plugins::priority_sort::factory);
        registry.register(plugins::resources_fit::NAME, plugins::resources_fit::factory);
        registry.register(plugins::network_qos::NAME, plugins::network_qos::factory);
        registry.register(plugins::region_latency::NAME, plugins::region_latency::factory);
        registry.register(plugins::placement_recorder::NAME, plugins::placement_recorder::factory);
        registry.register(plugins::least_recently_used::NAME, plugins::least_recently_used::factory);
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&PluginSettings, &SchedulerHandle) -> SchedulerResult<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    fn instantiate(
        &self,
        name: &str,
        config: &SchedulerConfig,
        handle: &SchedulerHandle,
    ) -> SchedulerResult<Arc<dyn Plugin>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownPlugin(name.to_string()))?;
        factory(&config.settings_for(name), handle)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[derive(Clone)]
pub struct WeightedPlugin {
    pub plugin: Arc<dyn Plugin>,
    pub weight: i64,
}

/// Plugins resolved for each stage, in invocation order.
#[derive(Clone)]
pub struct PluginSet {
    pub sort: Arc<dyn Plugin>,
    pub pre_filter: Vec<Arc<dyn Plugin>>,
    pub filter: Vec<Arc<dyn Plugin>>,
    pub score: Vec<WeightedPlugin>,
    pub reserve: Vec<Arc<dyn Plugin>>,
}

impl PluginSet {
    /// Resolve every configured plugin.
    ///
    /// Each name is instantiated once and shared across stages. A plugin
    /// listed for a stage it does not declare is an error. Plugins used by
    /// Filter or Score that declare PreFilter get their PreFilter run even
    /// when not listed, after the listed ones.
    pub fn build(
        registry: &PluginRegistry,
        config: &SchedulerConfig,
        handle: &SchedulerHandle,
    ) -> SchedulerResult<Self> {
        let mut instances: HashMap<String, Arc<dyn Plugin>> = HashMap::new();
        let mut resolve = |name: &str, stage: Stage| -> SchedulerResult<Arc<dyn Plugin>> {
            let plugin = match instances.get(name) {
                Some(p) => p.clone(),
                None => {
                    let p = registry.instantiate(name, config, handle)?;
                    instances.insert(name.to_string(), p.clone());
                    p
                }
            };
            if !plugin.capabilities().supports(stage) {
                return Err(SchedulerError::MissingCapability {
                    plugin: name.to_string(),
                    stage,
                });
            }
            Ok(plugin)
        };

        let plugins = &config.plugins;
        let sort = resolve(&plugins.sort, Stage::Sort)?;
        let mut pre_filter = plugins
            .pre_filter
            .iter()
            .map(|n| resolve(n, Stage::PreFilter))
            .collect::<SchedulerResult<Vec<_>>>()?;
        let filter = plugins
            .filter
            .iter()
            .map(|n| resolve(n, Stage::Filter))
            .collect::<SchedulerResult<Vec<_>>>()?;
        let score = plugins
            .score
            .iter()
            .map(|e| {
                Ok(WeightedPlugin {
                    plugin: resolve(&e.name, Stage::Score)?,
                    weight: e.weight,
                })
            })
            .collect::<SchedulerResult<Vec<_>>>()?;
        let reserve = plugins
            .reserve
            .iter()
            .map(|n| resolve(n, Stage::Reserve))
            .collect::<SchedulerResult<Vec<_>>>()?;

        let implied = filter
            .iter()
            .chain(score.iter().map(|w| &w.plugin))
            .filter(|p| p.capabilities().contains(Capabilities::PRE_FILTER))
            .cloned()
            .collect::<Vec<_>>();
        for plugin in implied {
            if !pre_filter.iter().any(|p| p.name() == plugin.name()) {
                debug!(plugin = plugin.name(), "enabling implied PreFilter");
                pre_filter.push(plugin);
            }
        }

        Ok(Self {
            sort,
            pre_filter,
            filter,
            score,
            reserve,
        })
    }
}
