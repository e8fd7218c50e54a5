//! Telemetry metric name constants.
//!
//! Centralised metric names for cachine requests. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `cachine_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `outcome`: how a request ended: "served", "regenerated", "failed" or
//!   "abandoned" (consumer dropped the event stream)
//! - `reason`: why the cache entry could not be served: "absent" or "stale"
//! - `path`: which pipeline produced payload bytes: "cache" or "regenerate"
//! - `store`: store name as reported by [`Store::name`](crate::store::Store::name)

/// Total requests handled by the orchestrator.
///
/// Labels: `outcome`.
pub const REQUESTS_TOTAL: &str = "cachine_requests_total";

/// Request duration in seconds, from `request()` to the terminal event.
///
/// Labels: `outcome`.
pub const REQUEST_DURATION_SECONDS: &str = "cachine_request_duration_seconds";

/// Requests where the caller's own copy was already current (`hit(true)`).
pub const CALLER_HITS_TOTAL: &str = "cachine_caller_hits_total";

/// Requests that could not be served from the cache store.
///
/// Labels: `reason` ("absent" | "stale").
pub const CACHE_MISSES_TOTAL: &str = "cachine_cache_misses_total";

/// Processor invocations.
///
/// Labels: `processor`.
pub const REGENERATIONS_TOTAL: &str = "cachine_regenerations_total";

/// Payload bytes moved through a request pipeline.
///
/// Labels: `path` ("cache" | "regenerate").
pub const BYTES_TOTAL: &str = "cachine_bytes_total";

/// Failed best-effort modification time updates on the cache store.
///
/// Labels: `store`.
pub const TOUCH_FAILURES_TOTAL: &str = "cachine_touch_failures_total";
