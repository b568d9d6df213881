use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Process-wide request counters. Mutated under the same lock as the cache
/// slot, never persisted.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct PerformanceStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub upstream_calls: u64,
    pub latency_samples: u64,
    pub avg_latency_ms: f64,
}

impl PerformanceStats {
    pub fn record_latency(&mut self, elapsed: Duration) {
        self.latency_samples += 1;
        let sample_ms = elapsed.as_secs_f64() * 1000.0;
        self.avg_latency_ms += (sample_ms - self.avg_latency_ms) / self.latency_samples as f64;
    }
}
