//! Plugin trait and capability flags.
//!
//! A plugin declares the stages it implements once, through
//! [`Plugin::capabilities`]; the registry reads the flags when building
//! the per-stage lists and the pipeline never asks a plugin for a stage
//! it did not declare.

use std::cmp::Ordering;
use std::ops::BitOr;

use fog_core::{NodeInfo, WorkloadRequest};

use crate::cycle_state::CycleState;
use crate::status::{Stage, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const SORT: Capabilities = Capabilities(1);
    pub const PRE_FILTER: Capabilities = Capabilities(1 << 1);
    pub const FILTER: Capabilities = Capabilities(1 << 2);
    pub const SCORE: Capabilities = Capabilities(1 << 3);
    pub const RESERVE: Capabilities = Capabilities(1 << 4);

    pub const fn empty() -> Self {
        Capabilities(0)
    }

    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flag for a plugin-bearing stage. `Sample` has none.
    pub fn for_stage(stage: Stage) -> Option<Capabilities> {
        match stage {
            Stage::Sort => Some(Self::SORT),
            Stage::PreFilter => Some(Self::PRE_FILTER),
            Stage::Filter => Some(Self::FILTER),
            Stage::Score => Some(Self::SCORE),
            Stage::Reserve => Some(Self::RESERVE),
            Stage::Sample => None,
        }
    }

    pub fn supports(self, stage: Stage) -> bool {
        Self::for_stage(stage).is_some_and(|flag| self.contains(flag))
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

/// A scheduling plugin.
///
/// Every stage method has a neutral default; only the stages named in
/// [`capabilities`](Plugin::capabilities) are ever invoked. Filter and
/// Score get a shared view of the cycle state and may run concurrently
/// for different nodes.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Queue order: `Less` means `a` is dequeued before `b`.
    fn compare(&self, _a: &WorkloadRequest, _b: &WorkloadRequest) -> Ordering {
        Ordering::Equal
    }

    fn pre_filter(&self, _state: &mut CycleState, _request: &WorkloadRequest) -> Status {
        Status::Success
    }

    fn filter(&self, _state: &CycleState, _request: &WorkloadRequest, _node: &NodeInfo) -> Status {
        Status::Success
    }

    /// Raw score in `0..=MAX_NODE_SCORE`.
    fn score(&self, _state: &CycleState, _request: &WorkloadRequest, _node: &NodeInfo) -> Result<i64, Status> {
        Ok(0)
    }

    fn reserve(&self, _state: &mut CycleState, _request: &WorkloadRequest, _node: &NodeInfo) -> Status {
        Status::Success
    }

    /// Roll back [`reserve`](Plugin::reserve). Called on every Reserve
    /// plugin when any of them fails.
    fn unreserve(&self, _state: &mut CycleState, _request: &WorkloadRequest, _node: &NodeInfo) {}
}
