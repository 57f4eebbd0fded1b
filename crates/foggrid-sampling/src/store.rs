//! Region node store.
//!
//! Readers take an `Arc` to an immutable [`NodeSnapshot`]; the sync writer
//! builds the next snapshot off to the side and swaps it in under a short
//! write lock, so a reader never observes a half-applied update.

use std::collections::BTreeMap;
use std::sync::Arc;

use fog_core::NodeInfo;
use parking_lot::{Mutex, RwLock};

/// An immutable view of the region's nodes, sorted by name.
#[derive(Debug, Default)]
pub struct NodeSnapshot {
    pub version: u64,
    pub nodes: Vec<NodeInfo>,
}

#[derive(Debug, Clone)]
pub enum NodeUpdate {
    Upsert(NodeInfo),
    Remove(String),
}

#[derive(Clone, Default)]
pub struct NodeStore {
    current: Arc<RwLock<Arc<NodeSnapshot>>>,
    writer: Arc<Mutex<()>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: Vec<NodeInfo>) -> Self {
        let store = Self::new();
        store.replace_all(nodes);
        store
    }

    /// The latest complete snapshot.
    pub fn snapshot(&self) -> Arc<NodeSnapshot> {
        self.current.read().clone()
    }

    pub fn len(&self) -> usize {
        self.current.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole node set. Returns the new snapshot version.
    pub fn replace_all(&self, nodes: Vec<NodeInfo>) -> u64 {
        let _writer = self.writer.lock();
        let by_name: BTreeMap<String, NodeInfo> =
            nodes.into_iter().map(|n| (n.name.clone(), n)).collect();
        self.publish(by_name)
    }

    /// Apply incremental updates on top of the current snapshot.
    pub fn apply(&self, updates: impl IntoIterator<Item = NodeUpdate>) -> u64 {
        let _writer = self.writer.lock();
        let mut by_name: BTreeMap<String, NodeInfo> = self
            .snapshot()
            .nodes
            .iter()
            .map(|n| (n.name.clone(), n.clone()))
            .collect();
        for update in updates {
            match update {
                NodeUpdate::Upsert(node) => {
                    by_name.insert(node.name.clone(), node);
                }
                NodeUpdate::Remove(name) => {
                    by_name.remove(&name);
                }
            }
        }
        self.publish(by_name)
    }

    fn publish(&self, by_name: BTreeMap<String, NodeInfo>) -> u64 {
        let version = self.current.read().version + 1;
        let next = Arc::new(NodeSnapshot {
            version,
            nodes: by_name.into_values().collect(),
        });
        *self.current.write() = next;
        version
    }
}
