//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! These are process-wide and independent of the per-instance counters
//! returned by [`Orchestrator::metrics()`](crate::Orchestrator::metrics).
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `strategy`: dispatch strategy, "cached", "debounced", "throttled", "queued"
//! - `status`: outcome, "ok" or "error"

/// Total requests completed through the orchestrator.
///
/// Labels: `strategy`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Request duration in seconds, measured from `request()` entry.
///
/// Labels: `strategy`.
pub const REQUEST_DURATION_SECONDS: &str = "huginn_request_duration_seconds";

/// Total fresh cache reads.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total cache reads that found nothing fresh.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total callers that joined an in-flight call instead of starting one.
pub const DEDUP_JOINS_TOTAL: &str = "huginn_dedup_joins_total";

/// Total debounced calls replaced by a later call for the same key.
pub const DEBOUNCE_SUPERSEDED_TOTAL: &str = "huginn_debounce_superseded_total";

/// Total throttled calls that arrived inside an open window.
pub const THROTTLE_DEFERRED_TOTAL: &str = "huginn_throttle_deferred_total";

/// Entries waiting in the request queue (gauge).
pub const QUEUE_DEPTH: &str = "huginn_queue_depth";

/// Queue slots currently occupied by unsettled network calls (gauge).
pub const QUEUE_ACTIVE: &str = "huginn_queue_active";
