//! Sampling error types.

use fog_core::ValidationError;
use thiserror::Error;

/// Failure of a single agent call, as seen by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("agent {region} unavailable: {reason}")]
    Unavailable { region: String, reason: String },

    #[error("agent {region} timed out after {timeout_ms}ms")]
    Timeout { region: String, timeout_ms: u64 },

    /// The agent answered with an explicit error.
    #[error("agent {region} rejected request ({kind}): {message}")]
    Rejected {
        region: String,
        kind: String,
        message: String,
    },
}

impl AgentError {
    pub fn region(&self) -> &str {
        match self {
            AgentError::Unavailable { region, .. }
            | AgentError::Timeout { region, .. }
            | AgentError::Rejected { region, .. } => region,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Timeout { .. })
    }
}

/// Errors raised by an agent while serving a sample.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("unknown sampling strategy: {0}")]
    UnknownStrategy(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl SampleError {
    /// Stable identifier carried in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SampleError::UnknownStrategy(_) => "unknown_strategy",
            SampleError::Invalid(_) => "invalid_request",
        }
    }
}

/// Errors surfaced by the broker or raised while assembling the sampling tier.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("sampling request addresses no known agent")]
    NoAgents,

    #[error("all {} addressed agents failed", .0.len())]
    AllAgentsFailed(Vec<AgentError>),

    #[error("sampling cancelled")]
    Cancelled,

    #[error("unknown sampling strategy: {0}")]
    UnknownStrategy(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub type SamplingResult<T> = Result<T, SamplingError>;
