//! Network QoS descriptors for region-graph links and service-graph
//! requirements.

use serde::{Deserialize, Serialize};

/// Coarse throughput class of a link, ordered from slowest to fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityClass {
    #[serde(rename = "1Mbps")]
    Qc1Mbps,
    #[serde(rename = "10Mbps")]
    Qc10Mbps,
    #[serde(rename = "100Mbps")]
    Qc100Mbps,
    #[serde(rename = "1Gbps")]
    Qc1Gbps,
    #[serde(rename = "10Gbps")]
    Qc10Gbps,
}

impl QualityClass {
    /// Nominal throughput of the class in kilobits per second.
    pub fn kbps(self) -> u64 {
        match self {
            QualityClass::Qc1Mbps => 1_000,
            QualityClass::Qc10Mbps => 10_000,
            QualityClass::Qc100Mbps => 100_000,
            QualityClass::Qc1Gbps => 1_000_000,
            QualityClass::Qc10Gbps => 10_000_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub bandwidth_kbps: u64,
    #[serde(default)]
    pub variance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Latency {
    pub packet_delay_ms: u32,
    #[serde(default)]
    pub variance: f64,
}

/// Measured QoS of a single region-graph link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLinkQos {
    pub quality_class: QualityClass,
    #[serde(default)]
    pub throughput: Throughput,
    #[serde(default)]
    pub latency: Latency,
    /// Packet loss in basis points.
    #[serde(default)]
    pub packet_loss_bp: u32,
}

impl NetworkLinkQos {
    /// Shortest-path weight of the link: its packet delay.
    pub fn scalar_weight(&self) -> u64 {
        u64::from(self.latency.packet_delay_ms)
    }

    /// Bandwidth of the link, falling back to the quality class nominal value.
    pub fn effective_bandwidth_kbps(&self) -> u64 {
        if self.throughput.bandwidth_kbps > 0 {
            self.throughput.bandwidth_kbps
        } else {
            self.quality_class.kbps()
        }
    }
}

/// Aggregated QoS along a multi-hop path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathQos {
    pub total_delay_ms: u64,
    pub delay_variance: f64,
    /// Bottleneck bandwidth.
    pub bandwidth_kbps: u64,
    pub bandwidth_variance: f64,
    /// Weakest quality class on the path.
    pub quality_class: QualityClass,
    pub packet_loss_bp: u32,
}

impl PathQos {
    /// QoS of a zero-hop path (both endpoints on the same node).
    pub fn local() -> Self {
        Self {
            total_delay_ms: 0,
            delay_variance: 0.0,
            bandwidth_kbps: u64::MAX,
            bandwidth_variance: 0.0,
            quality_class: QualityClass::Qc10Gbps,
            packet_loss_bp: 0,
        }
    }

    /// Extend the path by one link.
    pub fn push(&mut self, link: &NetworkLinkQos) {
        self.total_delay_ms += link.scalar_weight();
        self.delay_variance += link.latency.variance;
        self.bandwidth_kbps = self.bandwidth_kbps.min(link.effective_bandwidth_kbps());
        self.bandwidth_variance = self.bandwidth_variance.max(link.throughput.variance);
        self.quality_class = self.quality_class.min(link.quality_class);
        self.packet_loss_bp = (self.packet_loss_bp + link.packet_loss_bp).min(10_000);
    }
}

/// QoS a service-graph link demands from the network path between its
/// endpoints. Every unset bound is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkQosRequirements {
    #[serde(default)]
    pub min_quality_class: Option<QualityClass>,
    #[serde(default)]
    pub min_bandwidth_kbps: Option<u64>,
    #[serde(default)]
    pub max_bandwidth_variance: Option<f64>,
    #[serde(default)]
    pub max_packet_delay_ms: Option<u32>,
    #[serde(default)]
    pub max_delay_variance: Option<f64>,
    #[serde(default)]
    pub max_packet_loss_bp: Option<u32>,
}

impl LinkQosRequirements {
    /// Weight of a service link: its maximum tolerated delay, or zero.
    pub fn scalar_weight(&self) -> u64 {
        self.max_packet_delay_ms.map(u64::from).unwrap_or(0)
    }

    /// Whether a single region-graph link meets the requirements.
    pub fn is_satisfied_by(&self, link: &NetworkLinkQos) -> bool {
        let mut path = PathQos::local();
        path.push(link);
        self.is_satisfied_by_path(&path)
    }

    pub fn is_satisfied_by_path(&self, path: &PathQos) -> bool {
        self.min_quality_class.is_none_or(|qc| path.quality_class >= qc)
            && self.min_bandwidth_kbps.is_none_or(|bw| path.bandwidth_kbps >= bw)
            && self
                .max_bandwidth_variance
                .is_none_or(|v| path.bandwidth_variance <= v)
            && self
                .max_packet_delay_ms
                .is_none_or(|d| path.total_delay_ms <= u64::from(d))
            && self.max_delay_variance.is_none_or(|v| path.delay_variance <= v)
            && self
                .max_packet_loss_bp
                .is_none_or(|l| path.packet_loss_bp <= l)
    }
}
