//! Core of the meshwatch anchor hub.
//!
//! Reporters stream telemetry lines from mesh sensor nodes over
//! length-framed TCP links. The hub decodes each line, keeps the routing
//! topology and reporter registry current, forwards security alarms to an
//! external store, and fans every event out to connected viewers.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`decoder`] -- Positional telemetry line decoder
//! - [`registry`] -- Online reporters and station membership
//! - [`topology`] -- Cumulative node ranks, parents, and ignore edges
//! - [`broadcast`] -- Non-blocking viewer fan-out and command routing
//! - [`hub`] -- Shared state tying the above together
//! - [`alerts`] -- Alarm records and viewer notifications
//! - [`codec`] -- `<len>#<json>` framing of reporter links
//! - [`connection`] -- Reporter listener and per-link tasks

pub mod alerts;
pub mod broadcast;
pub mod codec;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod hub;
pub mod registry;
pub mod topology;

pub use alerts::{AlarmSink, AlertForwarder, DiscardSink};
pub use broadcast::{Broadcaster, ViewerFeed, ViewerSubscription};
pub use codec::{FrameCodec, FrameError};
pub use config::{
    AlarmConfig, AnchorConfig, ConfigError, HubSettings, ListenConfig, LoggingConfig,
};
pub use connection::{ListenerError, ReporterService};
pub use decoder::{Directive, decode};
pub use hub::Hub;
pub use registry::{Registry, ReporterHandle, ReporterLease, ReporterRecord};
pub use topology::Topology;
