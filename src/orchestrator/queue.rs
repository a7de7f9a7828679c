//! Global FIFO request queue under a hard concurrency cap.
//!
//! A slot is occupied from the moment an entry is popped and dispatched
//! until that call settles, successfully or not. Settling releases the slot
//! and immediately drains the queue again, so the first free slot always
//! goes to the head of the queue.
//!
//! Slot release is tied to a guard dropped by the dispatch task, so a
//! failing (or panicking) job still frees its slot.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::debug;

use crate::sync::lock;
use crate::telemetry;
use crate::{HuginnError, Result};

/// Default number of simultaneously dispatched calls.
pub const DEFAULT_MAX_CONCURRENT: usize = 6;

struct QueueEntry<V> {
    label: String,
    job: BoxFuture<'static, Result<V>>,
    reply: oneshot::Sender<Result<V>>,
}

struct QueueState<V> {
    pending: VecDeque<QueueEntry<V>>,
    active: usize,
    peak_active: usize,
}

struct QueueInner<V> {
    max_concurrent: usize,
    state: Mutex<QueueState<V>>,
}

/// Concurrency-limited FIFO queue.
pub struct RequestQueue<V> {
    inner: Arc<QueueInner<V>>,
}

impl<V> RequestQueue<V>
where
    V: Send + 'static,
{
    /// Create a queue allowing `max_concurrent` unsettled calls (minimum 1).
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    active: 0,
                    peak_active: 0,
                }),
            }),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Enqueue `job` and await its result.
    ///
    /// The job runs in its own task once a slot is free. Dropping the
    /// returned future does not abort a dispatched job.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub async fn submit(
        &self,
        label: impl Into<String>,
        job: BoxFuture<'static, Result<V>>,
    ) -> Result<V> {
        let (reply, rx) = oneshot::channel();
        {
            let mut state = lock(&self.inner.state);
            state.pending.push_back(QueueEntry {
                label: label.into(),
                job,
                reply,
            });
            metrics::gauge!(telemetry::QUEUE_DEPTH).set(state.pending.len() as f64);
        }
        QueueInner::drain(&self.inner);
        rx.await
            .unwrap_or_else(|_| Err(HuginnError::Cancelled("queued request discarded".into())))
    }

    /// Entries waiting for a slot.
    pub fn depth(&self) -> usize {
        lock(&self.inner.state).pending.len()
    }

    /// Slots occupied by unsettled calls.
    pub fn active(&self) -> usize {
        lock(&self.inner.state).active
    }

    /// Highest number of simultaneously occupied slots observed.
    pub fn peak_active(&self) -> usize {
        lock(&self.inner.state).peak_active
    }

    /// Drop every waiting entry; their callers receive
    /// [`HuginnError::Cancelled`]. Dispatched calls run to completion and
    /// release their slots as usual.
    pub fn clear(&self) {
        let dropped = {
            let mut state = lock(&self.inner.state);
            state.peak_active = state.active;
            std::mem::take(&mut state.pending)
        };
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "discarding queued requests");
        }
        metrics::gauge!(telemetry::QUEUE_DEPTH).set(0.0);
    }
}

impl<V> QueueInner<V>
where
    V: Send + 'static,
{
    fn drain(inner: &Arc<Self>) {
        let mut state = lock(&inner.state);
        while state.active < inner.max_concurrent {
            let Some(entry) = state.pending.pop_front() else {
                break;
            };
            state.active += 1;
            state.peak_active = state.peak_active.max(state.active);
            metrics::gauge!(telemetry::QUEUE_ACTIVE).set(state.active as f64);
            metrics::gauge!(telemetry::QUEUE_DEPTH).set(state.pending.len() as f64);
            debug!(
                request = %entry.label,
                active = state.active,
                waiting = state.pending.len(),
                "dispatching queued request"
            );

            let slot = SlotGuard {
                inner: Arc::clone(inner),
            };
            tokio::spawn(async move {
                let result = entry.job.await;
                // The slot is free before the caller sees its result.
                drop(slot);
                // Receivers are gone only if the caller gave up.
                let _ = entry.reply.send(result);
            });
        }
    }

    fn release(inner: &Arc<Self>) {
        {
            let mut state = lock(&inner.state);
            state.active = state.active.saturating_sub(1);
            metrics::gauge!(telemetry::QUEUE_ACTIVE).set(state.active as f64);
        }
        Self::drain(inner);
    }
}

/// Occupied queue slot; releasing it drains the queue.
struct SlotGuard<V: Send + 'static> {
    inner: Arc<QueueInner<V>>,
}

impl<V: Send + 'static> Drop for SlotGuard<V> {
    fn drop(&mut self) {
        QueueInner::release(&self.inner);
    }
}
