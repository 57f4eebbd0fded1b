//! Scheduler error types.

use fog_core::ValidationError;
use foggrid_sampling::SamplingError;
use foggrid_topology::TopologyError;
use thiserror::Error;

use crate::status::Stage;

/// Errors from building the scheduler and from submitting requests.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid workload: {0}")]
    Validation(#[from] ValidationError),

    #[error("scheduling queue is full (capacity {0})")]
    QueueFull(usize),

    #[error("scheduling queue is closed")]
    QueueClosed,

    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("plugin {plugin} does not implement the {stage} stage")]
    MissingCapability { plugin: String, stage: Stage },

    #[error("plugin {plugin} failed to initialize: {reason}")]
    PluginInit { plugin: String, reason: String },

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("sampling error: {0}")]
    Sampling(#[from] SamplingError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Misuse of the per-cycle state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleStateError {
    #[error("cycle state has no value for {0}")]
    Missing(&'static str),

    #[error("cycle state value for {0} has a different type")]
    TypeMismatch(&'static str),
}
