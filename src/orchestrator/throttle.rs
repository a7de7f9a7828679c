//! Per-key rate windows for throttled dispatch.
//!
//! [`ThrottleWindows`] only decides; it never sleeps or dispatches. The
//! orchestrator asks it whether a key may hit the network now and acts on
//! the [`Admission`] it gets back.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::key::CacheKey;
use crate::sync::lock;

/// Default throttle interval.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

/// Window count above which closed windows are pruned.
const PRUNE_THRESHOLD: usize = 256;

/// Outcome of asking to dispatch a throttled key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No open window: dispatch now. A new window has been opened.
    Dispatch,
    /// A window is open and closes after this long.
    Defer(Duration),
}

/// Last-dispatch times per key.
pub struct ThrottleWindows {
    interval: Duration,
    last_dispatch: Mutex<HashMap<CacheKey, Instant>>,
}

impl ThrottleWindows {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ask to dispatch `key` now.
    pub fn admit(&self, key: &CacheKey) -> Admission {
        let now = Instant::now();
        let mut windows = lock(&self.last_dispatch);
        if let Some(last) = windows.get(key) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.interval {
                return Admission::Defer(self.interval - elapsed);
            }
        }
        windows.insert(key.clone(), now);
        if windows.len() > PRUNE_THRESHOLD {
            let interval = self.interval;
            windows.retain(|_, last| now.saturating_duration_since(*last) < interval);
        }
        Admission::Dispatch
    }

    /// Number of keys with a recorded dispatch.
    pub fn len(&self) -> usize {
        lock(&self.last_dispatch).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.last_dispatch).clear();
    }
}
