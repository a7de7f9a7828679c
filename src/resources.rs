//! Typed access to one REST collection through an [`Orchestrator`].
//!
//! Reads go through whatever strategy the policy table assigns to their
//! path. Mutations are always queued and, once they succeed, drop every
//! cached read under the collection so the next read hits the network.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::key::Params;
use crate::orchestrator::{Orchestrator, RequestOptions};
use crate::transport::Method;
use crate::{HuginnError, Result};

/// Client for a collection such as `/rooms` or `/bookings`.
#[derive(Clone)]
pub struct ResourceClient {
    orchestrator: Arc<Orchestrator>,
    collection: String,
}

impl ResourceClient {
    /// Create a client for `collection` (e.g. `"/rooms"`).
    pub fn new(orchestrator: Arc<Orchestrator>, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        let collection = collection.trim_end_matches('/').to_string();
        Self {
            orchestrator,
            collection,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// `GET /collection` with optional filters.
    pub async fn list(&self, params: Params) -> Result<Value> {
        self.orchestrator
            .request(&self.collection, RequestOptions::new().params(params))
            .await
    }

    /// `GET /collection/{id}`.
    pub async fn get(&self, id: &str) -> Result<Value> {
        let path = self.item_path(id)?;
        self.orchestrator.request(&path, RequestOptions::new()).await
    }

    /// `GET /collection/search?q=...`.
    ///
    /// Pair with a `**/search` debounced policy to collapse keystroke bursts.
    pub async fn search(&self, query: &str) -> Result<Value> {
        let path = format!("{}/search", self.collection);
        self.orchestrator
            .request(&path, RequestOptions::new().param("q", query))
            .await
    }

    /// `POST /collection`.
    pub async fn create(&self, body: Value) -> Result<Value> {
        let options = RequestOptions::new().method(Method::Post).body(body);
        let created = self.orchestrator.request(&self.collection, options).await?;
        self.invalidate();
        Ok(created)
    }

    /// `PUT /collection/{id}`.
    pub async fn update(&self, id: &str, body: Value) -> Result<Value> {
        let path = self.item_path(id)?;
        let options = RequestOptions::new().method(Method::Put).body(body);
        let updated = self.orchestrator.request(&path, options).await?;
        self.invalidate();
        Ok(updated)
    }

    /// `DELETE /collection/{id}`.
    pub async fn delete(&self, id: &str) -> Result<Value> {
        let path = self.item_path(id)?;
        let options = RequestOptions::new().method(Method::Delete);
        let deleted = self.orchestrator.request(&path, options).await?;
        self.invalidate();
        Ok(deleted)
    }

    fn invalidate(&self) {
        debug!(collection = %self.collection, "invalidating cached reads");
        self.orchestrator.invalidate(&self.collection);
    }

    fn item_path(&self, id: &str) -> Result<String> {
        if id.is_empty() || id.contains(['/', '?', '#']) || id.contains(char::is_whitespace) {
            return Err(HuginnError::InvalidRequest(format!(
                "invalid resource id: {id:?}"
            )));
        }
        Ok(format!("{}/{}", self.collection, id))
    }
}
