//! Huginn - request orchestration for a booking API client
//!
//! This crate sits between application code and the remote API. Every
//! outbound request goes through an [`Orchestrator`], which picks a dispatch
//! strategy per resource path and combines a short-lived response cache,
//! single-flight deduplication, debouncing, throttling and a concurrency-
//! limited FIFO queue.
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{Orchestrator, RequestOptions, Strategy};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let orchestrator = Orchestrator::builder()
//!         .base_url("https://api.example.com")
//!         .policy("/rooms/*", Strategy::Cached)?
//!         .policy("**/search", Strategy::Debounced)?
//!         .policy("/availability/*", Strategy::Throttled)?
//!         .build()?;
//!
//!     let rooms = orchestrator
//!         .request("/rooms", RequestOptions::new().param("city", "Oslo"))
//!         .await?;
//!     println!("{rooms}");
//!
//!     let metrics = orchestrator.metrics();
//!     println!("hit rate: {:.2}", metrics.cache_hit_rate);
//!     Ok(())
//! }
//! ```
//!
//! # Collections
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use huginn::{Orchestrator, ResourceClient};
//! use serde_json::json;
//!
//! # async fn run() -> huginn::Result<()> {
//! let orchestrator = Arc::new(Orchestrator::builder().base_url("https://api.example.com").build()?);
//! let bookings = ResourceClient::new(orchestrator, "/bookings");
//! bookings.create(json!({"room": 12, "nights": 2})).await?;
//! let all = bookings.list(Default::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod orchestrator;
pub mod resources;
mod sync;
pub mod telemetry;
pub mod transport;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use config::Config;
pub use error::{HuginnError, Result};
pub use key::{CacheKey, Params};
pub use orchestrator::{
    MetricsSnapshot, Orchestrator, OrchestratorBuilder, PolicyRule, PolicyTable, RequestOptions,
    ResourcePattern, Strategy,
};
pub use resources::ResourceClient;
pub use transport::{HttpTransport, Method, Request, Transport};
