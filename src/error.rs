//! Error types for a3s-proctor

use thiserror::Error;

/// Errors that can occur while talking to the detection backend or
/// configuring the monitor
#[derive(Debug, Error)]
pub enum ProctorError {
    /// Backend connection or client setup failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// A backend request failed or returned a non-success status
    #[error("Request to '{endpoint}' failed: {reason}")]
    Request {
        endpoint: String,
        reason: String,
    },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Signal source rejected or failed the operation
    #[error("Signal source error: {0}")]
    Source(String),
}

/// Result type alias for proctoring operations
pub type Result<T> = std::result::Result<T, ProctorError>;
