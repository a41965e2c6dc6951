//! Shared application state for the viewer server.

use std::sync::Arc;

use meshwatch_core::Hub;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The hub every viewer subscribes to.
    pub hub: Arc<Hub>,
}

impl AppState {
    /// Create state serving `hub`.
    pub const fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}
