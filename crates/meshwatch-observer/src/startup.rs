//! Viewer server startup helper for the anchor binary.
//!
//! [`spawn_observer`] binds the viewer port on the caller's task, so a bind
//! failure surfaces as a startup error, then serves on a background task.
//!
//! # Usage
//!
//! ```rust,ignore
//! use meshwatch_observer::{AppState, ServerConfig, spawn_observer};
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::new(hub));
//! let handle = spawn_observer(&ServerConfig::default(), state, shutdown.clone()).await?;
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the viewer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind the viewer port and serve on a background Tokio task.
///
/// The server stops accepting when `shutdown` is cancelled; the returned
/// handle completes once in-flight connections have drained.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the server cannot bind to the
/// requested address.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>, StartupError> {
    let listener = server::bind(config).await?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Viewer server exited with error");
        }
    });

    tracing::info!(port = config.port, "Viewer server spawned on background task");
    Ok(handle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use meshwatch_core::{Hub, HubSettings};

    use super::*;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Arc::new(Hub::new(&HubSettings::default()))))
    }

    #[tokio::test]
    async fn spawned_server_stops_on_shutdown() {
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
        };
        let shutdown = CancellationToken::new();
        let handle = spawn_observer(&config, state(), shutdown.clone())
            .await
            .unwrap();

        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn occupied_port_is_a_startup_error() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: taken.local_addr().unwrap().port(),
        };

        let result = spawn_observer(&config, state(), CancellationToken::new()).await;
        assert!(matches!(result, Err(StartupError::Server(ServerError::Bind(_)))));
    }
}
