//! Shared FogGrid types.
//!
//! Workload requests flowing into the scheduler, nodes reported by region
//! agents, and the scores and decisions produced by a scheduling cycle.

use std::collections::{BTreeMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::resources::Resources;

/// Upper bound of every normalized node score.
pub const MAX_NODE_SCORE: i64 = 100;
/// Lower bound of every normalized node score.
pub const MIN_NODE_SCORE: i64 = 0;

// ── Workloads ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(default)]
    pub limits: Resources,
}

/// Identifies the application graph and the microservice a request belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceGraphMembership {
    pub graph: String,
    pub service: String,
}

/// Raw workload as submitted, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSubmission {
    pub id: String,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    #[serde(default)]
    pub priority: Option<i32>,
    /// Creation time in milliseconds since the epoch. Defaults to now.
    #[serde(default)]
    pub created_at_ms: Option<u64>,
    #[serde(default)]
    pub service_graph: Option<ServiceGraphMembership>,
}

/// A validated workload waiting for placement. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRequest {
    pub id: String,
    pub containers: Vec<ContainerSpec>,
    pub priority: i32,
    pub created_at_ms: u64,
    pub service_graph: Option<ServiceGraphMembership>,
}

impl WorkloadSubmission {
    /// Validate the submission into a [`WorkloadRequest`].
    pub fn validate(self) -> Result<WorkloadRequest, ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.containers.is_empty() {
            return Err(ValidationError::NoContainers(self.id));
        }

        let mut seen = HashSet::new();
        for container in &self.containers {
            if container.name.trim().is_empty() {
                return Err(ValidationError::EmptyContainerName(self.id));
            }
            if !seen.insert(container.name.as_str()) {
                return Err(ValidationError::DuplicateContainer {
                    workload: self.id.clone(),
                    container: container.name.clone(),
                });
            }
        }

        if let Some(m) = &self.service_graph {
            if m.graph.is_empty() || m.service.is_empty() {
                return Err(ValidationError::IncompleteMembership);
            }
        }

        Ok(WorkloadRequest {
            id: self.id,
            containers: self.containers,
            priority: self.priority.unwrap_or(0),
            created_at_ms: self.created_at_ms.unwrap_or_else(epoch_millis),
            service_graph: self.service_graph,
        })
    }
}

impl WorkloadRequest {
    /// Sum of all container limits.
    pub fn total_limits(&self) -> Resources {
        let mut total = Resources::new();
        for container in &self.containers {
            total.add(&container.limits);
        }
        total
    }
}

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Nodes ──────────────────────────────────────────────────────

/// A cluster node as seen by its region agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    #[serde(default)]
    pub region: String,
    pub allocatable: Resources,
    /// Total capacity. Empty means "same as allocatable".
    #[serde(default)]
    pub capacity: Resources,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// When the node last received a workload, as reported by its agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_placement_ms: Option<u64>,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>, region: impl Into<String>, allocatable: Resources) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            capacity: allocatable.clone(),
            allocatable,
            labels: BTreeMap::new(),
            last_placement_ms: None,
        }
    }

    pub fn with_capacity(mut self, capacity: Resources) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Capacity used for utilization math.
    pub fn effective_capacity(&self) -> &Resources {
        if self.capacity.is_empty() {
            &self.allocatable
        } else {
            &self.capacity
        }
    }

    /// True when every `selector` entry is present in the node's labels.
    pub fn matches_labels(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).is_some_and(|have| have == v))
    }
}

// ── Scores and decisions ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeScore {
    pub node: String,
    pub score: i64,
}

/// The outcome of a successful scheduling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementDecision {
    pub request_id: String,
    pub node: String,
    pub region: String,
    pub score: i64,
    /// Number of cycles it took, starting at 1.
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{CPU, MEMORY};

    fn test_submission() -> WorkloadSubmission {
        WorkloadSubmission {
            id: "default/web".to_string(),
            containers: vec![
                ContainerSpec {
                    name: "app".to_string(),
                    limits: Resources::new().with(CPU, 500).with(MEMORY, 1024),
                },
                ContainerSpec {
                    name: "sidecar".to_string(),
                    limits: Resources::new().with(CPU, 100),
                },
            ],
            priority: None,
            created_at_ms: Some(42),
            service_graph: None,
        }
    }

    #[test]
    fn validate_defaults_priority() {
        let req = test_submission().validate().unwrap();
        assert_eq!(req.priority, 0);
        assert_eq!(req.created_at_ms, 42);
    }

    #[test]
    fn validate_rejects_empty_id() {
        let mut sub = test_submission();
        sub.id = "  ".to_string();
        assert_eq!(sub.validate(), Err(ValidationError::EmptyId));
    }

    #[test]
    fn validate_rejects_no_containers() {
        let mut sub = test_submission();
        sub.containers.clear();
        assert!(matches!(sub.validate(), Err(ValidationError::NoContainers(_))));
    }

    #[test]
    fn validate_rejects_duplicate_container() {
        let mut sub = test_submission();
        sub.containers[1].name = "app".to_string();
        assert!(matches!(
            sub.validate(),
            Err(ValidationError::DuplicateContainer { .. })
        ));
    }

    #[test]
    fn validate_rejects_partial_membership() {
        let mut sub = test_submission();
        sub.service_graph = Some(ServiceGraphMembership {
            graph: "shop".to_string(),
            service: String::new(),
        });
        assert_eq!(sub.validate(), Err(ValidationError::IncompleteMembership));
    }

    #[test]
    fn total_limits_sum_containers() {
        let req = test_submission().validate().unwrap();
        let total = req.total_limits();
        assert_eq!(total.get(CPU), 600);
        assert_eq!(total.get(MEMORY), 1024);
    }

    #[test]
    fn submission_from_json() {
        let sub: WorkloadSubmission = serde_json::from_str(
            r#"{"id":"a","containers":[{"name":"c","limits":{"cpu":2,"memory":"4Gi"}}],"priority":10}"#,
        )
        .unwrap();
        let req = sub.validate().unwrap();
        assert_eq!(req.priority, 10);
        assert_eq!(req.total_limits().get(MEMORY), 4 << 30);
    }

    #[test]
    fn node_label_selector() {
        let node = NodeInfo::new("n1", "eu", Resources::new()).with_label("zone", "a");
        let mut selector = BTreeMap::new();
        assert!(node.matches_labels(&selector));
        selector.insert("zone".to_string(), "a".to_string());
        assert!(node.matches_labels(&selector));
        selector.insert("gpu".to_string(), "true".to_string());
        assert!(!node.matches_labels(&selector));
    }
}
