//! Common error types for evsound

use thiserror::Error;

/// Common result type for evsound operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the evsound crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Property name was rejected
    #[error("Invalid property name: {0:?}")]
    InvalidPropertyName(String),

    /// Property value was rejected
    #[error("Invalid value for property '{key}': {reason}")]
    InvalidPropertyValue {
        /// Offending key
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
