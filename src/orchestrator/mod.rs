//! Request orchestration: strategy selection and dispatch.
//!
//! [`Orchestrator`] is the single entry point for outbound requests. For
//! each request it picks a [`Strategy`] from its [`PolicyTable`] and runs
//! the request through it:
//!
//! | Strategy | Path to the network |
//! |---|---|
//! | cached | response cache (fresh value, join in-flight, or new call) |
//! | debounced | debounce window, then the response cache |
//! | throttled | one refresh per key per window, cached value otherwise |
//! | queued | FIFO queue under the concurrency cap, then the response cache |
//!
//! Mutations and `bypass_cache` requests are always queued and never read
//! from or write to the cache.
//!
//! Every orchestrator is an explicitly constructed instance; there is no
//! process-wide state apart from the `metrics` facade.

mod builder;
pub mod debounce;
mod options;
pub mod performance;
pub mod policy;
pub mod queue;
pub mod throttle;

pub use builder::OrchestratorBuilder;
pub use debounce::Debouncer;
pub use options::RequestOptions;
pub use performance::{MetricsSnapshot, PerformanceMetrics};
pub use policy::{PolicyRule, PolicyTable, ResourcePattern, Strategy};
pub use queue::RequestQueue;
pub use throttle::{Admission, ThrottleWindows};

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::Result;
use crate::cache::ResponseCache;
use crate::telemetry;
use crate::transport::{Request, Transport};

/// Request orchestrator over a [`Transport`].
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    cache: ResponseCache<Value>,
    policies: PolicyTable,
    debouncer: Debouncer<Value>,
    throttle: ThrottleWindows,
    queue: RequestQueue<Value>,
    performance: PerformanceMetrics,
}

impl Orchestrator {
    /// Create a new builder for configuring an orchestrator.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub(crate) fn from_parts(
        transport: Arc<dyn Transport>,
        cache: ResponseCache<Value>,
        policies: PolicyTable,
        debouncer: Debouncer<Value>,
        throttle: ThrottleWindows,
        queue: RequestQueue<Value>,
    ) -> Self {
        Self {
            transport,
            cache,
            policies,
            debouncer,
            throttle,
            queue,
            performance: PerformanceMetrics::new(),
        }
    }

    /// Issue a request for `path`.
    ///
    /// Malformed paths or parameters fail with
    /// [`HuginnError::InvalidRequest`](crate::HuginnError::InvalidRequest)
    /// before any cache, registry or queue state is touched. Transport
    /// failures are returned verbatim, to this caller and to every caller
    /// sharing its deduplicated or debounced call. Nothing is retried.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value> {
        let bypass = options.skips_cache();
        let strategy = self.classify(path, &options);
        let request = Arc::new(Request::new(
            options.method,
            path,
            options.params,
            options.body,
        )?);

        debug!(key = %request.key(), %strategy, "dispatching request");
        let start = Instant::now();
        let result = self.dispatch(strategy, &request, bypass).await;
        self.performance.record(strategy, result.is_ok(), start.elapsed());
        result
    }

    /// The strategy a request would be dispatched with.
    pub fn classify(&self, path: &str, options: &RequestOptions) -> Strategy {
        if options.skips_cache() {
            Strategy::Queued
        } else {
            self.policies.classify(path)
        }
    }

    /// Snapshot of this orchestrator's counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.performance.snapshot(self.cache.stats().hit_rate())
    }

    /// Clear cache, in-flight registry, pending debounce timers, throttle
    /// windows, the request queue and all counters.
    ///
    /// Callers waiting on discarded debounced or queued calls receive
    /// [`HuginnError::Cancelled`](crate::HuginnError::Cancelled). Calls
    /// already on the network run to completion without touching the cache.
    pub fn reset(&self) {
        self.cache.clear();
        self.cache.reset_stats();
        self.debouncer.clear();
        self.throttle.clear();
        self.queue.clear();
        self.performance.reset();
        debug!("orchestrator reset");
    }

    /// Drop cached responses for `path` and everything nested under it.
    pub fn invalidate(&self, path: &str) {
        self.cache.invalidate_prefix(path);
    }

    pub fn cache(&self) -> &ResponseCache<Value> {
        &self.cache
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Requests waiting for a queue slot.
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Queued requests currently on the network.
    pub fn active_requests(&self) -> usize {
        self.queue.active()
    }

    pub fn max_concurrent(&self) -> usize {
        self.queue.max_concurrent()
    }

    async fn dispatch(
        &self,
        strategy: Strategy,
        request: &Arc<Request>,
        bypass: bool,
    ) -> Result<Value> {
        match strategy {
            Strategy::Cached => {
                self.cache
                    .fetch_with_dedup(request.key(), self.producer(request))
                    .await
            }
            Strategy::Debounced => {
                self.debouncer
                    .call(request.key(), self.cached_job(request))
                    .await
            }
            Strategy::Throttled => self.throttled(request).await,
            Strategy::Queued => {
                let job = if bypass {
                    (self.producer(request))()
                } else {
                    self.cached_job(request)
                };
                let label = format!("{} {}", request.method, request.key());
                self.queue.submit(label, job).await
            }
        }
    }

    async fn throttled(&self, request: &Arc<Request>) -> Result<Value> {
        let key = request.key();
        let mut deferred = false;
        loop {
            let wait = match self.throttle.admit(key) {
                Admission::Dispatch => {
                    return self
                        .cache
                        .refresh_with_dedup(key, self.producer(request))
                        .await;
                }
                Admission::Defer(wait) => wait,
            };
            if !deferred {
                deferred = true;
                metrics::counter!(telemetry::THROTTLE_DEFERRED_TOTAL).increment(1);
            }
            if let Some(value) = self.cache.get(key) {
                return Ok(value);
            }
            if let Some(result) = self.cache.join_in_flight(key).await {
                return result;
            }
            debug!(
                key = %key,
                wait_ms = wait.as_millis() as u64,
                "throttle window open, deferring"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// A one-shot network call for `request`.
    fn producer(
        &self,
        request: &Arc<Request>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Value>> + Send + 'static + use<> {
        let transport = Arc::clone(&self.transport);
        let request = Arc::clone(request);
        move || async move { transport.send(&request).await }.boxed()
    }

    /// The network call for `request`, routed through the response cache.
    fn cached_job(&self, request: &Arc<Request>) -> BoxFuture<'static, Result<Value>> {
        let cache = self.cache.clone();
        let producer = self.producer(request);
        let request = Arc::clone(request);
        async move { cache.fetch_with_dedup(request.key(), producer).await }.boxed()
    }
}
