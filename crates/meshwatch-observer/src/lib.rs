//! Viewer server for the meshwatch anchor hub.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) streaming every hub event to a
//!   viewer and accepting console commands back
//! - **REST endpoints** for reading the current reporters, stations, and
//!   topology, plus a console command endpoint for scripted clients
//!
//! # Architecture
//!
//! Each `WebSocket` connection subscribes to the [`Hub`] and receives its
//! own bounded feed. A viewer that cannot keep up is dropped by the hub,
//! which closes the feed and ends the connection. REST reads take a
//! consistent snapshot under the hub lock.
//!
//! [`Hub`]: meshwatch_core::Hub

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
