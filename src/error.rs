//! Error types for the Gatekeeper crate.
//!
//! Admission decisions themselves never fail; these errors only arise at the
//! edges: loading configuration, validating policies and reading replay input.

use thiserror::Error;

/// Main error type for Gatekeeper operations.
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured endpoint policy failed validation
    #[error("Invalid policy for endpoint '{endpoint}': {reason}")]
    InvalidPolicy { endpoint: String, reason: String },

    /// Malformed replay trace input
    #[error("Trace error at line {line}: {reason}")]
    Trace { line: usize, reason: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decoding errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<config::ConfigError> for GatekeeperError {
    fn from(err: config::ConfigError) -> Self {
        GatekeeperError::Config(err.to_string())
    }
}

/// Result type alias for Gatekeeper operations.
pub type Result<T> = std::result::Result<T, GatekeeperError>;
