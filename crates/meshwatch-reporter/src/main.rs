//! Field reporter agent for meshwatch.
//!
//! Reads telemetry lines from a serial device (or stdin) attached to a
//! mesh border node and streams them to the anchor hub. Console commands
//! sent down by the anchor are written to stdout.
//!
//! # Architecture
//!
//! ```text
//! device --> line reader --> link --> anchor
//!                    stdout <-- link <-- anchor
//! ```

mod config;
mod error;
mod link;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ReporterConfig;
use crate::error::ReporterError;

/// Application entry point.
///
/// Initializes logging, loads configuration from environment variables,
/// then forwards device lines until the device ends or `Ctrl-C`.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the device cannot be
/// opened.
#[tokio::main]
async fn main() -> Result<(), ReporterError> {
    // Logs go to stderr; stdout carries console commands.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("meshwatch-reporter starting");

    let config = ReporterConfig::from_env()?;
    info!(
        anchor = %config.anchor_addr(),
        reconnect_delay_ms = config.reconnect_delay.as_millis(),
        "Configuration loaded"
    );

    let lines = link::open_device(config.device.as_deref()).await?;
    let mut stdout = tokio::io::stdout();

    tokio::select! {
        result = link::run(&config, lines, &mut stdout) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted");
        }
    }

    info!("meshwatch-reporter stopped");
    Ok(())
}
