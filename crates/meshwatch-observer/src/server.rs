//! Viewer HTTP server lifecycle management.
//!
//! [`bind`] claims the viewer port, and [`serve`] runs the Axum server on
//! it until the shutdown token fires. [`start_server`] does both.

use std::sync::Arc;

use meshwatch_core::ListenConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the viewer server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ListenConfig::default())
    }
}

impl From<&ListenConfig> for ServerConfig {
    fn from(listen: &ListenConfig) -> Self {
        Self {
            host: listen.viewer_host.clone(),
            port: listen.viewer_port,
        }
    }
}

/// Bind the viewer listener.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be bound.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve viewers on `listener` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Viewer server listening");
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("Viewer server stopped");
    Ok(())
}

/// Bind and run the viewer server until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    serve(listener, state, shutdown).await
}

/// Errors that can occur when starting or running the viewer server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
