//! PrioritySort — queue ordering.
//!
//! Higher priority first, then older requests first. With
//! `prefer_service_graph_members = true`, requests that belong to a
//! service graph go ahead of those that do not when both keys tie.

use std::cmp::Ordering;
use std::sync::Arc;

use fog_core::WorkloadRequest;
use fog_core::config::PluginSettings;
use serde::Deserialize;

use crate::error::SchedulerResult;
use crate::plugin::{Capabilities, Plugin};
use crate::registry::SchedulerHandle;

pub const NAME: &str = "PrioritySort";

#[derive(Debug, Default, Deserialize)]
struct PrioritySortArgs {
    #[serde(default)]
    prefer_service_graph_members: bool,
}

#[derive(Debug, Default)]
pub struct PrioritySort {
    prefer_service_graph_members: bool,
}

impl PrioritySort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preferring_service_graph_members() -> Self {
        Self {
            prefer_service_graph_members: true,
        }
    }
}

pub fn factory(settings: &PluginSettings, _handle: &SchedulerHandle) -> SchedulerResult<Arc<dyn Plugin>> {
    let args: PrioritySortArgs = super::parse_settings(NAME, settings)?;
    Ok(Arc::new(PrioritySort {
        prefer_service_graph_members: args.prefer_service_graph_members,
    }))
}

impl Plugin for PrioritySort {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SORT
    }

    fn compare(&self, a: &WorkloadRequest, b: &WorkloadRequest) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at_ms.cmp(&b.created_at_ms))
            .then_with(|| {
                if self.prefer_service_graph_members {
                    b.service_graph.is_some().cmp(&a.service_graph.is_some())
                } else {
                    Ordering::Equal
                }
            })
    }
}
