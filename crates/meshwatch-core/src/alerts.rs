//! Alarm forwarding.
//!
//! A `d:` telemetry line becomes an [`Alarm`]. The [`AlertForwarder`] turns
//! it into an [`AlarmRecord`] for the external store and tells viewers that
//! an alarm happened with a synthetic `gw -> store` hop. The payload itself
//! never reaches viewers.
//!
//! Store writes go through an [`AlarmSink`]. Sinks must not block the
//! caller: the reporter link that carried the alarm keeps reading while the
//! write is in flight, and a failed write is only logged.

use std::sync::Arc;

use meshwatch_types::{
    ALARM_RECORD_KIND, Alarm, AlarmClass, AlarmRecord, HopUpdate, NodeId, UpdatePayload,
    ViewerMessage,
};

use crate::config::AlarmConfig;
use crate::hub::Hub;

/// Label of the gateway end of the alarm notification hop.
pub const ALARM_HOP_SOURCE: &str = "gw";

/// Label of the store end of the alarm notification hop.
pub const ALARM_HOP_DESTINATION: &str = "store";

/// Traffic group of alarm notifications.
pub const ALARM_GROUP: &str = "evt";

/// Destination for alarm records.
pub trait AlarmSink: Send + Sync {
    /// Hand off a record for storage. Must return without waiting for the
    /// write to complete.
    fn submit(&self, record: AlarmRecord);
}

/// Sink used when the alarm store is disabled. Records are logged and
/// dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl AlarmSink for DiscardSink {
    fn submit(&self, record: AlarmRecord) {
        tracing::info!(
            oid = %record.oid,
            severity = ?record.severity,
            "Alarm store disabled, alarm not persisted"
        );
    }
}

/// Builds alarm records and notifications.
pub struct AlertForwarder {
    config: AlarmConfig,
    sink: Arc<dyn AlarmSink>,
}

impl std::fmt::Debug for AlertForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertForwarder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AlertForwarder {
    /// Create a forwarder writing to `sink`.
    pub const fn new(config: AlarmConfig, sink: Arc<dyn AlarmSink>) -> Self {
        Self { config, sink }
    }

    /// Build an alarm raised now.
    pub fn raise(&self, class: AlarmClass, node: NodeId) -> Alarm {
        self.raise_at(class, node, chrono::Utc::now().timestamp())
    }

    /// Build an alarm raised at `time` (unix seconds).
    pub fn raise_at(&self, class: AlarmClass, node: NodeId, time: i64) -> Alarm {
        let description = match class {
            AlarmClass::Critical => &self.config.critical_description,
            AlarmClass::Event => &self.config.event_description,
        };
        Alarm {
            class,
            severity: class.severity(),
            description: description.clone(),
            node,
            time,
        }
    }

    /// The durable record for `alarm`.
    pub fn record(&self, alarm: &Alarm) -> AlarmRecord {
        AlarmRecord {
            kind: ALARM_RECORD_KIND.to_owned(),
            oid: format!("{}_{}", self.config.id_prefix, alarm.time),
            causes: Vec::new(),
            description: alarm.description.clone(),
            source: self.config.source.clone(),
            severity: alarm.severity,
            timestamp: alarm.time,
        }
    }

    /// The viewer notification for `alarm`.
    pub fn notification(alarm: &Alarm) -> ViewerMessage {
        ViewerMessage::Update(UpdatePayload::Hop(HopUpdate {
            hopsrc: ALARM_HOP_SOURCE.to_owned(),
            hopdst: ALARM_HOP_DESTINATION.to_owned(),
            group: ALARM_GROUP.to_owned(),
            kind: alarm.class.as_token().to_owned(),
            payload: Some(serde_json::Value::Object(serde_json::Map::new())),
            time: alarm.time,
        }))
    }

    /// Submit `alarm` to the store and notify viewers.
    ///
    /// Returns the number of viewers notified.
    pub async fn forward(&self, hub: &Hub, alarm: &Alarm) -> usize {
        let record = self.record(alarm);
        tracing::info!(
            oid = %record.oid,
            node = %alarm.node,
            class = alarm.class.as_token(),
            "Forwarding alarm"
        );
        self.sink.submit(record);
        hub.publish(Self::notification(alarm)).await
    }
}
