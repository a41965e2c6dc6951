//! Axum router construction for the viewer server.
//!
//! Assembles the `WebSocket` endpoint and REST routes into a single
//! [`Router`] with CORS and HTTP tracing middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /ws` -- viewer event stream
/// - `GET /api/reporters` -- online reporters
/// - `GET /api/reporters/{id}` -- single reporter
/// - `GET /api/topology` -- topology snapshot
/// - `GET /api/stations` -- station membership
/// - `POST /api/console` -- console command routing
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::ws_viewer))
        .route("/api/reporters", get(handlers::list_reporters))
        .route("/api/reporters/{id}", get(handlers::get_reporter))
        .route("/api/topology", get(handlers::get_topology))
        .route("/api/stations", get(handlers::list_stations))
        .route("/api/console", post(handlers::post_console))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
