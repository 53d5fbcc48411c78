//! Error types for the crowd simulation.
//!
//! Errors only surface at construction and loading boundaries. The tick
//! path never fails: capacity exhaustion is a boolean and degraded agent
//! states are tolerated in place.

use thiserror::Error;

/// Result type alias using [`HordeError`].
pub type Result<T> = std::result::Result<T, HordeError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum HordeError {
    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file parsing error.
    #[error("Failed to parse config '{path}': {message}")]
    ConfigParse {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Failed to read a configuration file.
    #[error("Failed to read '{path}': {message}")]
    Io {
        /// Path to the file that failed to load.
        path: String,
        /// Error message.
        message: String,
    },
}

impl HordeError {
    /// Shorthand for [`HordeError::InvalidConfig`].
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
