//! Per-request options

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::Params;
use crate::transport::Method;

/// Options for [`Orchestrator::request`](crate::Orchestrator::request).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub method: Method,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Force the queued strategy and skip cache reads and writes.
    #[serde(default)]
    pub bypass_cache: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Add a single parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name, value);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    /// Whether the request must skip the response cache entirely.
    pub fn skips_cache(&self) -> bool {
        self.bypass_cache || self.method.is_mutation()
    }
}
