//! foggrid-sampling — two-tier node sampling.
//!
//! Each region runs a [`RegionAgent`] over a snapshot-swapping
//! [`NodeStore`]; the [`Broker`] fans a [`SamplingRequest`] out to the
//! addressed agents and merges their replies.
//!
//! # Agent routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/samples/{strategy}` | Sample nodes with the named strategy |
//! | GET | `/samples/status` | Agent health and node count |
//!
//! [`SamplingRequest`]: fog_core::SamplingRequest

pub mod agent;
pub mod broker;
pub mod client;
pub mod error;
pub mod server;
pub mod source;
pub mod store;
pub mod strategy;

pub use agent::RegionAgent;
pub use broker::{Broker, NodeSampler, SampleSet};
pub use client::{AgentClient, HttpAgentClient, LocalAgentClient};
pub use error::{AgentError, SampleError, SamplingError, SamplingResult};
pub use server::agent_router;
pub use source::{InventoryFileSource, NodeSource, StaticNodeSource, run_sync_loop};
pub use store::{NodeSnapshot, NodeStore, NodeUpdate};
pub use strategy::{SamplingStrategy, StrategyRegistry};
