//! Error types for the alarm store.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`fred`] and [`serde_json`] errors.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key was not found in `Dragonfly`.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
