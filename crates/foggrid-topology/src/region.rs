//! Region graph: cluster nodes of one topology instance connected by
//! measured network links.

use fog_core::config::TopologyConfig;
use fog_core::{LinkQosRequirements, NetworkLinkQos, PathQos};
use tracing::debug;

use crate::error::{TopologyError, TopologyResult};
use crate::graph::{LabeledGraph, NodeIndex};
use crate::path::ShortestPaths;

/// A resolved path between two region-graph nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct PathInfo {
    pub hops: Vec<String>,
    pub qos: PathQos,
}

#[derive(Debug, Clone)]
pub struct RegionGraph {
    graph: LabeledGraph<(), NetworkLinkQos>,
    head: Option<NodeIndex>,
}

impl Default for RegionGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionGraph {
    pub fn new() -> Self {
        Self {
            graph: LabeledGraph::undirected(),
            head: None,
        }
    }

    /// Build from configuration. Duplicate or unknown labels are errors.
    pub fn from_config(config: &TopologyConfig) -> TopologyResult<Self> {
        let mut region = Self::new();
        for name in &config.nodes {
            region.graph.try_add_node(name.clone(), ())?;
        }
        for link in &config.links {
            region.set_link(&link.from, &link.to, link.qos.clone())?;
        }
        if let Some(head) = &config.region_head {
            region.set_region_head(head)?;
        }
        debug!(
            nodes = region.graph.len(),
            links = config.links.len(),
            head = ?config.region_head,
            "region graph built"
        );
        Ok(region)
    }

    /// # Panics
    ///
    /// Panics if `name` is already in the graph.
    pub fn add_region_node(&mut self, name: &str) -> NodeIndex {
        self.graph.add_node(name, ())
    }

    pub fn set_link(&mut self, from: &str, to: &str, qos: NetworkLinkQos) -> TopologyResult<()> {
        self.graph.set_edge(from, to, qos)
    }

    pub fn link(&self, from: &str, to: &str) -> Option<&NetworkLinkQos> {
        self.graph.edge(from, to)
    }

    pub fn set_region_head(&mut self, name: &str) -> TopologyResult<()> {
        let idx = self
            .graph
            .index_of(name)
            .ok_or_else(|| TopologyError::UnknownLabel(name.to_string()))?;
        self.head = Some(idx);
        Ok(())
    }

    pub fn region_head(&self) -> Option<&str> {
        self.head.and_then(|idx| self.graph.label(idx))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.graph.index_of(name).is_some()
    }

    pub fn graph(&self) -> &LabeledGraph<(), NetworkLinkQos> {
        &self.graph
    }

    /// Latency-weighted shortest paths from `name`.
    pub fn shortest_paths_from(&self, name: &str) -> Option<ShortestPaths> {
        let idx = self.graph.index_of(name)?;
        Some(self.graph.shortest_paths_from(idx))
    }

    /// Shortest paths using only links that individually meet the
    /// per-link bounds of `requirements` (quality class, bandwidth).
    pub fn compliant_paths_from(
        &self,
        name: &str,
        requirements: &LinkQosRequirements,
    ) -> Option<ShortestPaths> {
        let idx = self.graph.index_of(name)?;
        Some(self.graph.shortest_paths_where(idx, |link| {
            requirements
                .min_quality_class
                .is_none_or(|qc| link.quality_class >= qc)
                && requirements
                    .min_bandwidth_kbps
                    .is_none_or(|bw| link.effective_bandwidth_kbps() >= bw)
        }))
    }

    /// Aggregated QoS along the path `paths` found to `target`.
    pub fn path_qos(&self, paths: &ShortestPaths, target: &str) -> Option<PathQos> {
        let idx = self.graph.index_of(target)?;
        let hops = paths.path_to(idx)?;
        let mut qos = PathQos::local();
        for pair in hops.windows(2) {
            qos.push(self.graph.edge_between(pair[0], pair[1])?);
        }
        Some(qos)
    }

    /// Shortest path between two nodes with its aggregated QoS.
    pub fn path_info(&self, from: &str, to: &str) -> Option<PathInfo> {
        let paths = self.shortest_paths_from(from)?;
        let qos = self.path_qos(&paths, to)?;
        let target = self.graph.index_of(to)?;
        let hops = paths
            .path_to(target)?
            .into_iter()
            .filter_map(|idx| self.graph.label(idx).map(str::to_string))
            .collect();
        Some(PathInfo { hops, qos })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fog_core::{Latency, QualityClass, Throughput};

    fn link(delay: u32, qc: QualityClass) -> NetworkLinkQos {
        NetworkLinkQos {
            quality_class: qc,
            throughput: Throughput::default(),
            latency: Latency {
                packet_delay_ms: delay,
                variance: 0.0,
            },
            packet_loss_bp: 0,
        }
    }

    fn test_region() -> RegionGraph {
        let mut r = RegionGraph::new();
        for n in ["head", "edge-1", "edge-2", "far"] {
            r.add_region_node(n);
        }
        r.set_link("head", "edge-1", link(2, QualityClass::Qc1Gbps)).unwrap();
        r.set_link("edge-1", "edge-2", link(3, QualityClass::Qc100Mbps)).unwrap();
        r.set_link("head", "edge-2", link(10, QualityClass::Qc1Gbps)).unwrap();
        r.set_link("edge-2", "far", link(40, QualityClass::Qc10Mbps)).unwrap();
        r.set_region_head("head").unwrap();
        r
    }

    #[test]
    fn region_head_must_be_a_known_node() {
        let mut r = test_region();
        assert_eq!(r.region_head(), Some("head"));
        assert_eq!(
            r.set_region_head("missing"),
            Err(TopologyError::UnknownLabel("missing".to_string()))
        );
        assert_eq!(r.region_head(), Some("head"));
    }

    #[test]
    fn path_info_follows_lowest_latency() {
        let r = test_region();
        let info = r.path_info("head", "edge-2").unwrap();
        assert_eq!(info.hops, vec!["head", "edge-1", "edge-2"]);
        assert_eq!(info.qos.total_delay_ms, 5);
        assert_eq!(info.qos.quality_class, QualityClass::Qc100Mbps);
    }

    #[test]
    fn compliant_paths_skip_slow_links() {
        let r = test_region();
        let req = LinkQosRequirements {
            min_quality_class: Some(QualityClass::Qc1Gbps),
            ..Default::default()
        };
        let paths = r.compliant_paths_from("head", &req).unwrap();
        let qos = r.path_qos(&paths, "edge-2").unwrap();
        assert_eq!(qos.total_delay_ms, 10);
        assert!(r.path_qos(&paths, "far").is_none());
    }

    #[test]
    fn from_config_rejects_duplicates() {
        let config = TopologyConfig {
            nodes: vec!["a".to_string(), "a".to_string()],
            ..Default::default()
        };
        assert_eq!(
            RegionGraph::from_config(&config).unwrap_err(),
            TopologyError::DuplicateLabel("a".to_string())
        );
    }
}
