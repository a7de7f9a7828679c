//! Response caching and request deduplication.
//!
//! [`ResponseCache`] is the leaf component of the orchestration layer. It
//! answers one question: have we already answered this exact request
//! recently, or is someone asking right now?
//!
//! - Fresh values are served from an in-memory store (moka-backed, with a
//!   freshness window checked against the tokio clock).
//! - Concurrent identical requests are collapsed onto a single network
//!   call through the in-flight registry in [`flight`].

mod flight;
pub mod response;

pub use response::{CacheConfig, CacheStats, ResponseCache};
