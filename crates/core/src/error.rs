//! Core error types

use thiserror::Error;

/// Core error type for MeshRoute
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration parsed but holds an unusable value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Node address text could not be parsed
    #[error("Invalid node address '{input}': {reason}")]
    InvalidAddress {
        /// Text that failed to parse
        input: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
