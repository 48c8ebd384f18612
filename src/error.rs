//! Error types
//!
//! One crate-wide error enum. The variants mirror the failure taxonomy of the
//! request pipeline: configuration resolution, provider construction,
//! transport, in-band vendor stream errors, cancellation, and the bounded
//! model-discovery probe. Nothing in this crate retries; every error surfaces
//! to the caller immediately.

use std::time::Duration;

/// Errors produced by clients, adapters, and the streaming engine.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No usable configuration could be resolved, or a required field is
    /// missing. Fatal; never retried.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The provider identifier matched neither a built-in adapter nor a
    /// runtime registration.
    #[error("Unknown provider type: {0}")]
    UnknownProvider(String),

    /// The vendor answered with a non-2xx status.
    #[error("LLM API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// A network-level failure (connect, read, TLS) outside vendor control.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The caller aborted the request via `cancel_request`/`cancel_all_requests`.
    /// Distinct from `HttpError` so UIs can suppress it as expected behavior.
    #[error("Request cancelled")]
    Cancelled,

    /// An error frame delivered inside an otherwise-successful stream
    /// (e.g. Anthropic `type: "error"` events).
    #[error("Provider stream error [{code}]: {message}")]
    VendorStream {
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// Model discovery exceeded its time bound. Distinct from `HttpError`.
    #[error("Model discovery timed out after {0:?} - please check your connection")]
    DiscoveryTimeout(Duration),

    /// A vendor payload could not be decoded into the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LlmError {
    /// True when the error was caused by caller-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True when model discovery hit its time bound.
    pub fn is_discovery_timeout(&self) -> bool {
        matches!(self, Self::DiscoveryTimeout(_))
    }

    /// HTTP status code for API errors, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        Self::HttpError(error.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(error: serde_json::Error) -> Self {
        Self::ParseError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_distinguishable() {
        assert!(LlmError::Cancelled.is_cancelled());
        assert!(!LlmError::HttpError("connection reset".into()).is_cancelled());
    }

    #[test]
    fn discovery_timeout_is_distinguishable() {
        let err = LlmError::DiscoveryTimeout(Duration::from_millis(50));
        assert!(err.is_discovery_timeout());
        assert!(!err.is_cancelled());
        assert!(err.to_string().contains("50ms"));
    }

    #[test]
    fn api_error_carries_status_and_body() {
        let err = LlmError::ApiError {
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(err.status(), Some(429));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }
}
