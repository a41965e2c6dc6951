//! Shared type definitions for the meshwatch anchor hub.
//!
//! This crate is the single source of truth for the values that cross a
//! crate or process boundary: identifiers, decoded telemetry events, the
//! reporter and viewer wire messages, and the durable alarm record.
//! Viewer-facing types flow to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- String newtypes for reporters, stations, and mesh nodes
//! - [`events`] -- [`DecodedEvent`] and its payloads
//! - [`wire`] -- Reporter records and viewer messages
//! - [`alarm`] -- Alarm classes, severities, and [`AlarmRecord`]

pub mod alarm;
pub mod events;
pub mod ids;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use alarm::{ALARM_RECORD_KIND, AlarmClass, AlarmRecord, Severity};
pub use events::{Alarm, DecodedEvent, ParentChange, ROUTING_GROUP, Relay};
pub use ids::{ALL_STATION, NodeId, ReporterId, StationId, ViewerId};
pub use wire::{
    ConsoleCommand, ConsoleLine, HopUpdate, IgnoreEdge, IgnoreUpdate, RAW_RECORD_TYPE, RankUpdate,
    RawRecord, ReporterCommand, ReporterOffline, ReporterOnline, ReporterSummary, StationSet,
    TopologyEntry, TopologySnapshot, UpdatePayload, ViewerMessage, ViewerRequest,
};
