//! Error types for the gluvia_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for gluvia_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Application configuration error (config file, CLI values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A prescription entry cannot be evaluated because a required field
    /// is missing or unusable
    #[error("Prescription entry for {meal} is invalid: {field}")]
    Configuration { meal: String, field: String },

    /// No active prescription has been stored yet
    #[error("No active prescription found")]
    NoPrescription,

    /// Caller supplied an out-of-range or malformed argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub(crate) fn configuration(meal: impl Into<String>, field: impl Into<String>) -> Self {
        Error::Configuration {
            meal: meal.into(),
            field: field.into(),
        }
    }
}
