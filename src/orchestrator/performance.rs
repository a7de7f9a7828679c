//! Per-orchestrator performance counters.
//!
//! [`PerformanceMetrics`] is observational only: recording never influences
//! dispatch. Alongside the in-memory counters every outcome is also emitted
//! through the `metrics` facade (see [`telemetry`](crate::telemetry)).

use std::sync::Mutex;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::policy::Strategy;
use crate::sync::lock;
use crate::telemetry;

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    errors: u64,
    successes: u64,
    success_latency: Duration,
}

/// Request counters for one orchestrator instance.
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    counters: Mutex<Counters>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request.
    pub fn record(&self, strategy: Strategy, ok: bool, latency: Duration) {
        {
            let mut c = lock(&self.counters);
            c.total += 1;
            if ok {
                c.successes += 1;
                c.success_latency += latency;
            } else {
                c.errors += 1;
            }
        }

        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "strategy" => strategy.as_str(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "strategy" => strategy.as_str(),
        )
        .record(latency.as_secs_f64());
    }

    /// Snapshot the counters. `cache_hit_rate` is supplied by the caller,
    /// which owns the cache.
    pub fn snapshot(&self, cache_hit_rate: f64) -> MetricsSnapshot {
        let c = lock(&self.counters);
        let average_response_time = u32::try_from(c.successes)
            .ok()
            .filter(|n| *n > 0)
            .map_or(Duration::ZERO, |n| c.success_latency / n);
        let error_rate = if c.total == 0 {
            0.0
        } else {
            c.errors as f64 / c.total as f64
        };
        MetricsSnapshot {
            total_requests: c.total,
            errors: c.errors,
            average_response_time,
            cache_hit_rate,
            error_rate,
        }
    }

    pub fn reset(&self) {
        *lock(&self.counters) = Counters::default();
    }
}

/// Read-only view of an orchestrator's counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub errors: u64,
    /// Mean latency of successful requests.
    #[serde(rename = "average_response_time_ms", serialize_with = "as_millis")]
    pub average_response_time: Duration,
    pub cache_hit_rate: f64,
    pub error_rate: f64,
}

fn as_millis<S: Serializer>(d: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64() * 1000.0)
}
