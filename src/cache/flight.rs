//! In-flight request registry.
//!
//! Maps a [`CacheKey`] to the one shared outcome of the network call
//! currently running for it. Each registration carries an id so that a
//! settling call only ever removes its own registration, never one that
//! replaced it after a `clear()`.

use std::collections::HashMap;

use futures_util::future::{BoxFuture, Shared};

use crate::Result;
use crate::key::CacheKey;

/// Outcome handle shared by every caller of one network call.
pub(crate) type SharedFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

pub(crate) struct Flight<V> {
    id: u64,
    outcome: SharedFetch<V>,
}

pub(crate) struct FlightRegistry<V> {
    flights: HashMap<CacheKey, Flight<V>>,
}

impl<V: Clone> FlightRegistry<V> {
    pub(crate) fn new() -> Self {
        Self {
            flights: HashMap::new(),
        }
    }

    /// The outcome of the call running for `key`, if any.
    pub(crate) fn join(&self, key: &CacheKey) -> Option<SharedFetch<V>> {
        self.flights.get(key).map(|f| f.outcome.clone())
    }

    pub(crate) fn register(&mut self, key: CacheKey, id: u64, outcome: SharedFetch<V>) {
        self.flights.insert(key, Flight { id, outcome });
    }

    /// Remove the registration for `key` if it still belongs to call `id`.
    pub(crate) fn release(&mut self, key: &CacheKey, id: u64) -> bool {
        if self.flights.get(key).is_some_and(|f| f.id == id) {
            self.flights.remove(key);
            true
        } else {
            false
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.flights.len()
    }

    pub(crate) fn clear(&mut self) {
        self.flights.clear();
    }
}
