//! Alarm store for the meshwatch anchor hub.
//!
//! Alarms raised by mesh nodes are written to a `Dragonfly` (Redis-compatible)
//! instance, where downstream consumers pick them up:
//!
//! ```text
//! AlertForwarder --submit--> AlarmStore
//!                                |-- HSET <oid> payload/subject/unmarshaller
//!                                +-- PUBLISH <channel> <oid>
//! ```
//!
//! # Modules
//!
//! - [`dragonfly`] -- [`AlarmStore`] and its key layout
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;

pub use dragonfly::AlarmStore;
pub use error::DbError;
