//! Delay-and-supersede dispatch for rapidly repeated calls.
//!
//! Each call for a key (re)arms a timer. A call arriving while the timer is
//! pending aborts it, replaces the pending job with its own and arms a new
//! timer; only the job still pending when a timer fires is dispatched.
//! Every caller in the window awaits the same outcome handle, so superseded
//! callers resolve with the survivor's result.
//!
//! Timers are owned tokio tasks. A fired timer re-checks its generation
//! under the slot lock before dispatching, so an abort that loses the race
//! against the timer's wake-up still cannot dispatch a superseded job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::key::CacheKey;
use crate::sync::lock;
use crate::telemetry;
use crate::{HuginnError, Result};

/// Default debounce delay.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

type Slots<V> = Arc<Mutex<HashMap<CacheKey, DebounceSlot<V>>>>;

struct DebounceSlot<V> {
    generation: u64,
    job: BoxFuture<'static, Result<V>>,
    reply: oneshot::Sender<Result<V>>,
    outcome: Shared<BoxFuture<'static, Result<V>>>,
    timer: JoinHandle<()>,
}

/// Per-key debouncer.
pub struct Debouncer<V> {
    delay: Duration,
    slots: Slots<V>,
    next_generation: AtomicU64,
}

impl<V> Debouncer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Submit `job` for `key` and await the outcome of whichever job for
    /// that key survives the debounce window.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context; timers are spawned tasks.
    pub async fn call(&self, key: &CacheKey, job: BoxFuture<'static, Result<V>>) -> Result<V> {
        let outcome = {
            let mut slots = lock(&self.slots);
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            match slots.get_mut(key) {
                Some(slot) => {
                    slot.timer.abort();
                    slot.job = job;
                    slot.generation = generation;
                    slot.timer = self.arm(key.clone(), generation);
                    metrics::counter!(telemetry::DEBOUNCE_SUPERSEDED_TOTAL).increment(1);
                    debug!(key = %key, "debounced call superseded");
                    slot.outcome.clone()
                }
                None => {
                    let (reply, rx) = oneshot::channel();
                    let outcome = rx
                        .map(|received| {
                            received.unwrap_or_else(|_| {
                                Err(HuginnError::Cancelled("debounced call discarded".into()))
                            })
                        })
                        .boxed()
                        .shared();
                    let timer = self.arm(key.clone(), generation);
                    slots.insert(
                        key.clone(),
                        DebounceSlot {
                            generation,
                            job,
                            reply,
                            outcome: outcome.clone(),
                            timer,
                        },
                    );
                    outcome
                }
            }
        };
        outcome.await
    }

    /// Number of keys with a pending (not yet dispatched) call.
    pub fn pending(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Abort every pending timer. Callers waiting on a discarded slot
    /// receive [`HuginnError::Cancelled`].
    pub fn clear(&self) {
        let drained: Vec<_> = lock(&self.slots).drain().collect();
        for (_, slot) in drained {
            slot.timer.abort();
        }
    }

    fn arm(&self, key: CacheKey, generation: u64) -> JoinHandle<()> {
        let slots = Arc::clone(&self.slots);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let fired = {
                let mut slots = lock(&slots);
                if slots.get(&key).is_some_and(|s| s.generation == generation) {
                    slots.remove(&key)
                } else {
                    None
                }
            };
            if let Some(slot) = fired {
                debug!(key = %key, "debounce window elapsed, dispatching");
                let result = slot.job.await;
                // Receivers are gone only if every caller gave up.
                let _ = slot.reply.send(result);
            }
        })
    }
}
