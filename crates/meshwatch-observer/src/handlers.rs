//! REST API endpoint handlers for the viewer server.
//!
//! All reads take a consistent snapshot from the shared [`Hub`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/reporters` | Online reporters, ordered by id |
//! | `GET` | `/api/reporters/{id}` | One online reporter |
//! | `GET` | `/api/topology` | Nodes, ignore edges, and reporters |
//! | `GET` | `/api/stations` | Station name to member ids |
//! | `POST` | `/api/console` | Route a console command |
//!
//! [`Hub`]: meshwatch_core::Hub

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use meshwatch_types::{ConsoleCommand, ReporterId, ReporterSummary, StationId, TopologySnapshot};
use serde::Serialize;

use crate::error::ObserverError;
use crate::state::AppState;

/// Response body of `POST /api/console`.
#[derive(Debug, Serialize)]
pub struct ConsoleResponse {
    /// Number of reporters the command was queued for.
    pub delivered: usize,
}

/// List online reporters.
pub async fn list_reporters(State(state): State<Arc<AppState>>) -> Json<Vec<ReporterSummary>> {
    Json(state.hub.reporters().await)
}

/// Fetch one online reporter by id.
pub async fn get_reporter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReporterSummary>, ObserverError> {
    let id = ReporterId::new(id);
    state
        .hub
        .reporters()
        .await
        .into_iter()
        .find(|r| r.id == id)
        .map(Json)
        .ok_or_else(|| ObserverError::NotFound(format!("reporter {id} is not online")))
}

/// Current topology, in the same shape as the `init` event.
pub async fn get_topology(State(state): State<Arc<AppState>>) -> Json<TopologySnapshot> {
    Json(state.hub.snapshot().await)
}

/// Station membership. Always contains `all`.
pub async fn list_stations(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<StationId, Vec<ReporterId>>> {
    Json(state.hub.stations().await)
}

/// Route a console command to reporters, as a viewer would over `/ws`.
pub async fn post_console(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ConsoleCommand>, JsonRejection>,
) -> Result<Json<ConsoleResponse>, ObserverError> {
    let Json(command) = body.map_err(|e| ObserverError::InvalidBody(e.body_text()))?;
    let delivered = state.hub.route_command(&command).await;
    tracing::debug!(targets = command.dst.len(), delivered, "Console command via API");
    Ok(Json(ConsoleResponse { delivered }))
}
