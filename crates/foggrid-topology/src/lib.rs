//! foggrid-topology — topology graph model.
//!
//! Labeled graphs stored as an index arena:
//! - [`LabeledGraph`] — generic graph with O(1) label lookup and Dijkstra
//! - [`RegionGraph`] — cluster nodes linked by measured network QoS
//! - [`ServiceGraph`] — microservices of one application linked by QoS requirements
//! - [`PlacementMap`] — which nodes currently host each microservice

pub mod error;
pub mod graph;
pub mod path;
pub mod placement;
pub mod region;
pub mod service;

pub use error::{TopologyError, TopologyResult};
pub use graph::{EdgeWeight, LabeledGraph, NodeIndex};
pub use path::ShortestPaths;
pub use placement::PlacementMap;
pub use region::{PathInfo, RegionGraph};
pub use service::{LinkDirection, ServiceGraph, ServiceLink};
