//! Huginn error types

/// Huginn error types.
///
/// `Clone` so that one outcome can be delivered to every caller sharing a
/// deduplicated or debounced request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HuginnError {
    // Network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    // Request shape errors
    /// Malformed resource path or parameters. Raised before any cache,
    /// registry or queue state is touched.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A pending call was discarded before it produced a result
    /// (reset, or its task was aborted).
    #[error("request cancelled: {0}")]
    Cancelled(String),
}

impl HuginnError {
    /// Whether a caller-side retry could plausibly succeed.
    ///
    /// The orchestrator never retries on its own; this is for callers that
    /// layer a retry policy on top of [`Orchestrator::request`](crate::Orchestrator::request).
    pub fn is_transient(&self) -> bool {
        match self {
            HuginnError::Http(_) | HuginnError::Timeout => true,
            HuginnError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for HuginnError {
    fn from(err: serde_json::Error) -> Self {
        HuginnError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for HuginnError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HuginnError::Timeout
        } else if let Some(status) = err.status() {
            HuginnError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            HuginnError::Http(err.to_string())
        }
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
