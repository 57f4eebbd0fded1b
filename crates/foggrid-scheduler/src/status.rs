//! Plugin status codes and cycle failures.

use std::fmt;

/// Result of a single plugin invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success,
    /// The request cannot be placed (on this node, for Filter).
    Unschedulable(String),
    /// Something went wrong; the cycle is aborted.
    InternalError(String),
}

impl Status {
    pub fn unschedulable(reason: impl Into<String>) -> Self {
        Status::Unschedulable(reason.into())
    }

    pub fn internal(cause: impl fmt::Display) -> Self {
        Status::InternalError(cause.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Status::Success => None,
            Status::Unschedulable(r) | Status::InternalError(r) => Some(r),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::Unschedulable(r) => write!(f, "unschedulable: {r}"),
            Status::InternalError(r) => write!(f, "internal error: {r}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Sort,
    Sample,
    PreFilter,
    Filter,
    Score,
    Reserve,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Sort => "Sort",
            Stage::Sample => "Sample",
            Stage::PreFilter => "PreFilter",
            Stage::Filter => "Filter",
            Stage::Score => "Score",
            Stage::Reserve => "Reserve",
        };
        f.write_str(name)
    }
}

/// Why a scheduling cycle did not produce a placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub stage: Stage,
    /// Plugin that failed, if the failure came from one.
    pub plugin: Option<String>,
    /// Never [`Status::Success`].
    pub status: Status,
    /// The cycle was aborted from outside rather than failing on its own.
    pub cancelled: bool,
}

impl CycleError {
    pub fn new(stage: Stage, plugin: Option<&str>, status: Status) -> Self {
        Self {
            stage,
            plugin: plugin.map(str::to_string),
            status,
            cancelled: false,
        }
    }

    pub fn cancelled(stage: Stage) -> Self {
        Self {
            stage,
            plugin: None,
            status: Status::internal("cancelled"),
            cancelled: true,
        }
    }

    pub fn is_unschedulable(&self) -> bool {
        !self.cancelled && matches!(self.status, Status::Unschedulable(_))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cancelled {
            return write!(f, "{} stage: cancelled", self.stage);
        }
        match &self.plugin {
            Some(p) => write!(f, "{} stage, plugin {p}: {}", self.stage, self.status),
            None => write!(f, "{} stage: {}", self.stage, self.status),
        }
    }
}

impl std::error::Error for CycleError {}
