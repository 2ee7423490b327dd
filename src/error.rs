//! Error types for infomaniak-ddns.

use thiserror::Error;

/// Result type alias for infomaniak-ddns.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout or connection failure talking to the lookup or update endpoint.
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed response body.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Wrong-family or unparseable address returned by the lookup service.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::Parse(e.to_string())
    }
}
