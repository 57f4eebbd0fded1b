//! Validation errors raised before a request reaches the queue.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("workload id must not be empty")]
    EmptyId,

    #[error("workload {0} declares no containers")]
    NoContainers(String),

    #[error("workload {0} has a container without a name")]
    EmptyContainerName(String),

    #[error("workload {workload} declares container {container} twice")]
    DuplicateContainer { workload: String, container: String },

    #[error("invalid quantity {value:?}: {reason}")]
    InvalidQuantity { value: String, reason: String },

    #[error("basis points must be within 0..=10000, got {0}")]
    BasisPointsOutOfRange(u32),

    #[error("service graph membership needs both graph and service labels")]
    IncompleteMembership,
}
