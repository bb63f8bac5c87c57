//! Response DTOs for the preview server API
//!
//! Artifact endpoints answer with raw PNG bytes; only the operational
//! endpoints use these JSON bodies.

use serde::Serialize;

use crate::pipeline::PipelineStats;

/// Counters for one artifact namespace.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub cache_enabled: bool,
    #[serde(flatten)]
    pub counters: PipelineStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl NamespaceStats {
    pub fn new(cache_enabled: bool, counters: PipelineStats) -> Self {
        let hit_rate = counters.hit_rate();
        Self {
            cache_enabled,
            counters,
            hit_rate,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub link_previews: NamespaceStats,
    pub qr_codes: NamespaceStats,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_stats_hit_rate() {
        let mut counters = PipelineStats::new();
        for _ in 0..4 {
            counters.record_hit();
        }
        counters.record_miss();

        let stats = NamespaceStats::new(true, counters);
        assert!((stats.hit_rate - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_namespace_stats_flattened() {
        let json = serde_json::to_value(NamespaceStats::new(false, PipelineStats::new())).unwrap();
        assert_eq!(json["cache_enabled"], false);
        assert_eq!(json["hits"], 0);
        assert_eq!(json["compression_failures"], 0);
        assert_eq!(json["hit_rate"], 0.0);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
