//! Built-in plugins.

pub mod least_recently_used;
pub mod network_qos;
pub mod placement_recorder;
pub mod priority_sort;
pub mod region_latency;
pub mod resources_fit;

use fog_core::config::PluginSettings;
use serde::de::DeserializeOwned;

use crate::error::{SchedulerError, SchedulerResult};

/// Decode a plugin's settings table into its argument struct.
pub(crate) fn parse_settings<T: DeserializeOwned>(plugin: &str, settings: &PluginSettings) -> SchedulerResult<T> {
    toml::Value::Table(settings.clone())
        .try_into()
        .map_err(|e: toml::de::Error| SchedulerError::PluginInit {
            plugin: plugin.to_string(),
            reason: e.to_string(),
        })
}
