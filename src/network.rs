//! Link model: transfer times, round-trip latencies, coverage-aware
//! effective bandwidth, and nearest-server lookup.

use serde::{Deserialize, Serialize};

use crate::config::NetworkConfig;
use crate::model::EdgeServer;

const QUALITY_MIN: f64 = 0.1;
const QUALITY_MAX: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkModel {
    mobile_bandwidth_mbps: f64,
    backbone_bandwidth_mbps: f64,
    mobile_latency_s: f64,
    backbone_latency_s: f64,
    mobile_quality: f64,
    backbone_quality: f64,
}

impl NetworkModel {
    pub fn new(config: &NetworkConfig) -> Self {
        NetworkModel {
            mobile_bandwidth_mbps: config.mobile_to_edge_bandwidth_mbps,
            backbone_bandwidth_mbps: config.edge_to_cloud_bandwidth_mbps,
            mobile_latency_s: config.mobile_to_edge_latency_ms / 1000.0,
            backbone_latency_s: config.edge_to_cloud_latency_ms / 1000.0,
            mobile_quality: config.mobile_quality.clamp(QUALITY_MIN, QUALITY_MAX),
            backbone_quality: config.backbone_quality.clamp(QUALITY_MIN, QUALITY_MAX),
        }
    }

    /// Adjust mobile link quality at runtime, clamped to [0.1, 1.0].
    pub fn set_mobile_quality(&mut self, quality: f64) {
        self.mobile_quality = quality.clamp(QUALITY_MIN, QUALITY_MAX);
    }

    /// Adjust backbone link quality at runtime, clamped to [0.1, 1.0].
    pub fn set_backbone_quality(&mut self, quality: f64) {
        self.backbone_quality = quality.clamp(QUALITY_MIN, QUALITY_MAX);
    }

    /// Effective device-to-edge bandwidth: nominal bandwidth degraded by
    /// link quality and quadratic distance falloff inside coverage, zero
    /// outside it.
    pub fn mobile_effective_bandwidth(&self, distance_m: f64, coverage_radius_m: f64) -> f64 {
        if distance_m > coverage_radius_m || coverage_radius_m <= 0.0 {
            return 0.0;
        }
        let falloff = (1.0 - distance_m / coverage_radius_m).powi(2);
        self.mobile_bandwidth_mbps * self.mobile_quality * falloff
    }

    /// One-way transfer time over the mobile link; infinite out of coverage
    /// or at the exact coverage boundary where bandwidth reaches zero.
    pub fn mobile_transfer_time(
        &self,
        size_kb: f64,
        distance_m: f64,
        coverage_radius_m: f64,
    ) -> f64 {
        let bandwidth = self.mobile_effective_bandwidth(distance_m, coverage_radius_m);
        if bandwidth <= 0.0 {
            return f64::INFINITY;
        }
        size_kb * 8.0 * 1024.0 / (bandwidth * 1e6)
    }

    /// One-way transfer time over the backbone.
    pub fn backbone_transfer_time(&self, size_kb: f64) -> f64 {
        size_kb * 8.0 * 1024.0 / (self.backbone_bandwidth_mbps * self.backbone_quality * 1e6)
    }

    /// Round-trip propagation latency of the mobile link.
    pub fn mobile_round_trip_latency(&self) -> f64 {
        2.0 * self.mobile_latency_s
    }

    /// Round-trip propagation latency of the backbone.
    pub fn backbone_round_trip_latency(&self) -> f64 {
        2.0 * self.backbone_latency_s
    }

    /// Total communication time for offloading to an edge server: input up,
    /// output down, plus the round-trip latency.
    pub fn edge_offload_time(
        &self,
        input_kb: f64,
        output_kb: f64,
        distance_m: f64,
        coverage_radius_m: f64,
    ) -> f64 {
        self.mobile_transfer_time(input_kb, distance_m, coverage_radius_m)
            + self.mobile_transfer_time(output_kb, distance_m, coverage_radius_m)
            + self.mobile_round_trip_latency()
    }

    /// Total communication time for offloading to the cloud through an edge
    /// relay: mobile leg both ways plus backbone leg both ways, with both
    /// round-trip latencies.
    pub fn cloud_offload_time(
        &self,
        input_kb: f64,
        output_kb: f64,
        relay_distance_m: f64,
        coverage_radius_m: f64,
    ) -> f64 {
        self.edge_offload_time(input_kb, output_kb, relay_distance_m, coverage_radius_m)
            + self.backbone_transfer_time(input_kb)
            + self.backbone_transfer_time(output_kb)
            + self.backbone_round_trip_latency()
    }
}

/// Index of the nearest edge server covering the point, if any.
pub fn nearest_in_coverage(servers: &[EdgeServer], x: f64, y: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, server) in servers.iter().enumerate() {
        let distance = server.distance_to(x, y);
        if distance <= server.coverage_radius_m {
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((idx, distance)),
            }
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EdgeConfig;

    fn model() -> NetworkModel {
        NetworkModel::new(&NetworkConfig {
            mobile_quality: 1.0,
            backbone_quality: 1.0,
            ..NetworkConfig::default()
        })
    }

    #[test]
    fn test_bandwidth_falls_off_with_distance() {
        let net = model();
        let at_center = net.mobile_effective_bandwidth(0.0, 400.0);
        let halfway = net.mobile_effective_bandwidth(200.0, 400.0);
        assert!((at_center - 100.0).abs() < 1e-9);
        assert!((halfway - 25.0).abs() < 1e-9);
        assert_eq!(net.mobile_effective_bandwidth(400.1, 400.0), 0.0);
    }

    #[test]
    fn test_transfer_out_of_coverage_is_infinite() {
        let net = model();
        assert!(net.mobile_transfer_time(100.0, 500.0, 400.0).is_infinite());
        assert!(net.mobile_transfer_time(100.0, 100.0, 400.0).is_finite());
    }

    #[test]
    fn test_backbone_transfer_time() {
        let net = model();
        // 1000 KB over 1000 Mbps.
        let t = net.backbone_transfer_time(1000.0);
        assert!((t - 1000.0 * 8.0 * 1024.0 / 1e9).abs() < 1e-12);
    }

    #[test]
    fn test_quality_clamped() {
        let mut net = model();
        net.set_mobile_quality(5.0);
        assert!((net.mobile_effective_bandwidth(0.0, 400.0) - 100.0).abs() < 1e-9);
        net.set_mobile_quality(0.0);
        assert!((net.mobile_effective_bandwidth(0.0, 400.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_in_coverage_picks_closest() {
        let cfg = EdgeConfig::default();
        let servers = vec![
            EdgeServer::new(0, 0.0, 0.0, &cfg),
            EdgeServer::new(1, 300.0, 0.0, &cfg),
        ];
        assert_eq!(nearest_in_coverage(&servers, 250.0, 0.0), Some(1));
        assert_eq!(nearest_in_coverage(&servers, 50.0, 0.0), Some(0));
        assert_eq!(nearest_in_coverage(&servers, 5000.0, 5000.0), None);
    }
}
