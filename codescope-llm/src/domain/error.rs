//! Reviewer error types
//!
//! Typed errors for model reviewer calls, classified so wrappers know which
//! failures are worth retrying.

use std::time::Duration;

use thiserror::Error;

/// Model reviewer error
#[derive(Debug, Error)]
pub enum ReviewerError {
    /// Authentication failed (invalid API key, expired token, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limited by the provider
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Seconds to wait before retrying (if provided)
        retry_after: Option<u64>,
        message: String,
    },

    /// Request was rejected (bad parameters, too many tokens, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Network/connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Service temporarily unavailable (HTTP 5xx)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Provider returned something that is not a completion
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Reviewer is not usable with the current configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ReviewerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReviewerError::RateLimited { .. }
                | ReviewerError::Network(_)
                | ReviewerError::Timeout
                | ReviewerError::ServiceUnavailable(_)
        )
    }

    /// Get retry-after duration if available
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ReviewerError::RateLimited { retry_after, .. } => {
                retry_after.map(Duration::from_secs)
            }
            _ => None,
        }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::RateLimited {
            retry_after,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }
}

impl From<reqwest::Error> for ReviewerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ReviewerError::Timeout
        } else if err.is_connect() {
            ReviewerError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            ReviewerError::InvalidResponse(err.to_string())
        } else {
            ReviewerError::Network(err.to_string())
        }
    }
}
