//! The network seam: request shape and the [`Transport`] trait.
//!
//! The orchestrator never talks HTTP itself. Every dispatch strategy ends
//! in a [`Transport::send`] call, and whatever that call resolves to is
//! what gets cached and returned, unexamined.
//!
//! [`HttpTransport`] is the reqwest-backed implementation used against the
//! booking API; tests substitute their own implementations.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::{CacheKey, Params};
use crate::{HuginnError, Result};

/// Default request timeout for [`HttpTransport`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method of a logical request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Whether the method writes server state (create/update/delete).
    pub fn is_mutation(self) -> bool {
        !matches!(self, Method::Get)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A validated request, ready to be sent.
///
/// Construction derives the [`CacheKey`], so a `Request` that exists has
/// already passed path and parameter validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub params: Params,
    pub body: Option<Value>,
    key: CacheKey,
}

impl Request {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        params: Params,
        body: Option<Value>,
    ) -> Result<Self> {
        let path = path.into();
        let key = CacheKey::new(&path, &params)?;
        Ok(Self {
            method,
            path,
            params,
            body,
            key,
        })
    }

    /// Shorthand for a parameterless `GET`.
    pub fn get(path: impl Into<String>) -> Result<Self> {
        Self::new(Method::Get, path, Params::new(), None)
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

/// Performs the actual network call for a request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging (e.g. `"http"`).
    fn name(&self) -> &str;

    /// Send `request` and resolve to its response body.
    ///
    /// Non-success responses must be reported as errors; the orchestrator
    /// has no knowledge of status codes.
    async fn send(&self, request: &Request) -> Result<Value>;
}

/// reqwest-backed [`Transport`] against a base URL.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// Create a transport with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(crate::version::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|e| {
                HuginnError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: &Request) -> Result<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.into(), &url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params.to_query_pairs());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HuginnError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
