//! Error types for the anchor binary.
//!
//! [`AnchorError`] covers every failure that stops the anchor. Only
//! startup can fail; once both listeners are bound, per-connection and
//! store errors are logged and the hub keeps running.

/// Top-level error for the anchor binary.
#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: meshwatch_core::ConfigError,
    },

    /// The reporter listener could not bind.
    #[error("reporter listener error: {source}")]
    Listener {
        /// The underlying listener error.
        #[from]
        source: meshwatch_core::ListenerError,
    },

    /// The viewer server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: meshwatch_observer::StartupError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {0}")]
    Signal(#[source] std::io::Error),
}
