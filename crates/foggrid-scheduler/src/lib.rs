//! foggrid-scheduler — plugin-driven placement of workload requests.
//!
//! A request flows through:
//! 1. [`SchedulingQueue`] — bounded, ordered by the Sort plugin
//! 2. [`DecisionPipeline`] — Sample → PreFilter → Filter → Score → Reserve
//! 3. [`Scheduler`] — workers, bounded retries, outcome stream
//!
//! Plugins are resolved by name through a [`PluginRegistry`] once at
//! startup; each declares the stages it implements via [`Capabilities`].

pub mod cycle_state;
pub mod error;
pub mod pipeline;
pub mod plugin;
pub mod plugins;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod score;
pub mod status;
pub mod topology;

pub use cycle_state::{CycleState, StateKey};
pub use error::{CycleStateError, SchedulerError, SchedulerResult};
pub use pipeline::{DecisionPipeline, Placement};
pub use plugin::{Capabilities, Plugin};
pub use queue::{QueuedRequest, SchedulingQueue};
pub use registry::{PluginRegistry, PluginSet, SchedulerHandle, WeightedPlugin};
pub use scheduler::{Scheduler, SchedulerStats, SchedulingOutcome};
pub use score::{combine_scores, normalize_scores, select_best};
pub use status::{CycleError, Stage, Status};
pub use topology::TopologyCatalog;
