//! Topology error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("label already present in graph: {0}")]
    DuplicateLabel(String),

    #[error("unknown label: {0}")]
    UnknownLabel(String),

    #[error("duplicate service graph: {0}")]
    DuplicateServiceGraph(String),
}

pub type TopologyResult<T> = Result<T, TopologyError>;
