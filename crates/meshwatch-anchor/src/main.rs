//! Anchor hub binary for meshwatch.
//!
//! Wires the reporter listener, the alarm store, and the viewer server
//! around one shared [`Hub`], then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `meshwatch-config.yaml` (or `MESHWATCH_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the hub
//! 4. Connect to the alarm store, falling back to logging alarms
//! 5. Bind the reporter listener
//! 6. Bind and spawn the viewer server
//! 7. Serve reporters until `Ctrl-C`, then drain both listeners

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use meshwatch_core::{
    AlarmConfig, AlarmSink, AlertForwarder, AnchorConfig, DiscardSink, Hub, ReporterService,
};
use meshwatch_db::AlarmStore;
use meshwatch_observer::{AppState, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::AnchorError;

/// Config file read when `MESHWATCH_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "meshwatch-config.yaml";

/// How long to wait for the listeners to drain after `Ctrl-C`.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Application entry point for the anchor.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or either listener
/// cannot bind.
#[tokio::main]
async fn main() -> Result<(), AnchorError> {
    // 1. Load configuration.
    let path = config_path();
    let (config, from_file) = load_config(&path)?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("meshwatch-anchor starting");
    if from_file {
        info!(path = %path.display(), "Configuration loaded");
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
    }

    // 3. Create the hub.
    let hub = Arc::new(Hub::new(&config.hub));

    // 4. Alarm store.
    let sink = alarm_sink(&config.alarms).await;
    let alerts = Arc::new(AlertForwarder::new(config.alarms.clone(), sink));

    // 5. Reporter listener.
    let listener = meshwatch_core::connection::bind(
        &config.listen.reporter_host,
        config.listen.reporter_port,
    )
    .await?;

    // 6. Viewer server.
    let shutdown = CancellationToken::new();
    let observer = meshwatch_observer::spawn_observer(
        &ServerConfig::from(&config.listen),
        Arc::new(AppState::new(Arc::clone(&hub))),
        shutdown.clone(),
    )
    .await?;

    // 7. Serve until interrupted.
    let service = ReporterService::new(hub, alerts, &config.hub);
    let reporters = tokio::spawn(service.serve(listener, shutdown.clone()));
    info!(
        reporter_port = config.listen.reporter_port,
        viewer_port = config.listen.viewer_port,
        "meshwatch-anchor running"
    );

    let signal = tokio::signal::ctrl_c().await;
    info!("Shutting down");
    shutdown.cancel();

    for (name, task) in [("reporters", reporters), ("viewers", observer)] {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(task = name, error = %e, "Listener task failed"),
            Err(_) => warn!(task = name, "Listener did not drain in time"),
        }
    }

    signal.map_err(AnchorError::Signal)?;
    info!("meshwatch-anchor shutdown complete");
    Ok(())
}

/// Path of the config file, from `MESHWATCH_CONFIG` or the default.
fn config_path() -> PathBuf {
    std::env::var_os("MESHWATCH_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load configuration from `path` and apply environment overrides.
///
/// A missing file means defaults. Returns whether the file was read.
fn load_config(path: &Path) -> Result<(AnchorConfig, bool), AnchorError> {
    let from_file = path.exists();
    let mut config = if from_file {
        AnchorConfig::from_file(path)?
    } else {
        AnchorConfig::default()
    };
    config.apply_env_overrides();
    Ok((config, from_file))
}

/// Pick where alarm records go.
///
/// Uses the external store when enabled and reachable. Otherwise alarms
/// are logged and dropped; viewers still see the notification.
async fn alarm_sink(config: &AlarmConfig) -> Arc<dyn AlarmSink> {
    if !config.enabled {
        info!("Alarm store disabled, alarms will be logged only");
        return Arc::new(DiscardSink);
    }

    match AlarmStore::connect(config).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                url = %config.store_url,
                error = %e,
                "Alarm store unavailable, alarms will be logged only"
            );
            Arc::new(DiscardSink)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_means_defaults() {
        let (config, from_file) =
            load_config(Path::new("/nonexistent/meshwatch-config.yaml")).unwrap();
        assert!(!from_file);
        assert_eq!(config.hub.viewer_buffer, 256);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let dir = std::env::temp_dir().join("meshwatch-anchor-bad-config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("meshwatch-config.yaml");
        std::fs::write(&path, "listen: [not, a, map]\n").unwrap();

        assert!(matches!(
            load_config(&path),
            Err(AnchorError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn disabled_store_is_never_contacted() {
        let config = AlarmConfig {
            enabled: false,
            // Unroutable: a connection attempt would stall far past the deadline.
            store_url: "redis://10.255.255.1:6379".to_owned(),
            ..AlarmConfig::default()
        };
        let picked =
            tokio::time::timeout(Duration::from_millis(500), alarm_sink(&config)).await;
        assert!(picked.is_ok());
    }

    #[tokio::test]
    async fn bad_store_url_falls_back_without_connecting() {
        let config = AlarmConfig {
            store_url: "not a url".to_owned(),
            ..AlarmConfig::default()
        };
        let picked =
            tokio::time::timeout(Duration::from_millis(500), alarm_sink(&config)).await;
        assert!(picked.is_ok());
    }
}
