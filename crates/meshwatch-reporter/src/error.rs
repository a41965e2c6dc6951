//! Error types for the reporter agent.

use meshwatch_core::FrameError;

/// Errors that can occur while running the reporter agent.
#[derive(Debug, thiserror::Error)]
pub enum ReporterError {
    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The device or the anchor link failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}
