//! Error types for ldapsync operations.
//!
//! Directory failures are not represented here: the export pipeline swallows
//! them into empty results. This type covers configuration problems and the
//! submission to the synchronisation API, which do terminate a run.

use thiserror::Error;

/// Message reported when the synchronisation API rejects a request with `429`.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests (only 2 syncs per 12 hours allowed)";

/// Main error type for ldapsync operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Remote service could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The synchronisation API refused the request because of its rate limit
    #[error("{status} {reason}. Server responded: {message}")]
    RateLimited {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        reason: String,
        /// Explanation of the limit
        message: String,
    },

    /// The synchronisation API answered with a non-success status
    #[error("{status} {reason}. Server responded: {body}")]
    SubmissionFailed {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        reason: String,
        /// Response body as returned by the server
        body: String,
    },

    /// Failed to serialise or deserialise a payload
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Specialized result type for ldapsync operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::SubmissionFailed { .. } => "SUBMISSION_FAILED",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// Returns the HTTP status attached to a submission error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { status, .. } | Self::SubmissionFailed { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Returns true for errors raised before any network activity.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::ValidationError(_) | Self::InvalidEndpoint(_)
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
