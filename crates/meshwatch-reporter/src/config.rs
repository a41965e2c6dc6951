//! Configuration for the reporter agent.
//!
//! All configuration is loaded from environment variables:
//!
//! - `ANCHOR_HOST` -- anchor hostname (default `localhost`)
//! - `ANCHOR_PORT` -- anchor reporter port (default `23511`)
//! - `REPORTER_DEVICE` -- device path to read lines from (default stdin)
//! - `RECONNECT_DELAY_MS` -- pause between connection attempts (default 1000)

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ReporterError;

const DEFAULT_ANCHOR_HOST: &str = "localhost";
const DEFAULT_ANCHOR_PORT: u16 = 23511;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

/// Complete reporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Anchor hostname or address.
    pub anchor_host: String,
    /// Anchor reporter port.
    pub anchor_port: u16,
    /// Device to read telemetry lines from. `None` reads stdin.
    pub device: Option<PathBuf>,
    /// Pause between connection attempts.
    pub reconnect_delay: Duration,
}

impl ReporterConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ReporterError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's
    /// value if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ReporterError> {
        let anchor_host = lookup("ANCHOR_HOST").unwrap_or_else(|| DEFAULT_ANCHOR_HOST.to_owned());

        let anchor_port = lookup("ANCHOR_PORT").map_or(Ok(DEFAULT_ANCHOR_PORT), |raw| {
            raw.parse()
                .map_err(|e| ReporterError::Config(format!("invalid ANCHOR_PORT: {e}")))
        })?;

        let device = lookup("REPORTER_DEVICE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        let delay_ms = lookup("RECONNECT_DELAY_MS").map_or(Ok(DEFAULT_RECONNECT_DELAY_MS), |raw| {
            raw.parse()
                .map_err(|e| ReporterError::Config(format!("invalid RECONNECT_DELAY_MS: {e}")))
        })?;

        Ok(Self {
            anchor_host,
            anchor_port,
            device,
            reconnect_delay: Duration::from_millis(delay_ms),
        })
    }

    /// `host:port` of the anchor.
    pub fn anchor_addr(&self) -> String {
        format!("{}:{}", self.anchor_host, self.anchor_port)
    }
}
