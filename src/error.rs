//! Error types for chatbatch
//!
//! This module defines the hard error type used for configuration, setup and
//! driver failures, and the soft failure type carried by chat session
//! outcomes. Both use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for chatbatch operations
///
/// These errors abort the operation that raised them: loading configuration,
/// building an HTTP client, refreshing a token on explicit request, or
/// reading and writing batch files. Provider exchanges made through
/// [`crate::providers::ChatSession::ask`] never surface as this type; see
/// [`AskFailure`] instead.
#[derive(Error, Debug)]
pub enum ChatbatchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (client construction, unknown provider, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Token exchange failures
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// Batch input/output errors (malformed rows, missing fields)
    #[error("Batch error: {0}")]
    Batch(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a chat exchange produced no answer
///
/// Returned inside [`crate::providers::AskOutcome::Failed`]. Batch callers
/// usually substitute a placeholder and keep going; interactive callers can
/// match on the variant to explain what went wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskFailure {
    /// Provider answered with a non-success status other than 429
    #[error("provider returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, best effort
        body: String,
    },

    /// Every attempt was rate limited
    #[error("rate limited on all {attempts} attempts")]
    RetryExhausted {
        /// Number of requests sent before giving up
        attempts: u32,
    },

    /// No access token could be obtained
    #[error("no valid access token; token refresh has not succeeded")]
    Unauthenticated,

    /// Connection, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Success status with a body that does not carry an answer
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Result type alias for chatbatch operations
///
/// Uses `anyhow::Error` as the error type so callers can attach context
/// while propagating [`ChatbatchError`] values.
pub type Result<T> = anyhow::Result<T>;
