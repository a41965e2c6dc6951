//! Decoded telemetry events.
//!
//! A [`DecodedEvent`] is produced for every recognised telemetry line (and a
//! [`DecodedEvent::Raw`] for every raw record). Events are immutable once
//! built and are handed downstream by value.

use crate::alarm::{AlarmClass, Severity};
use crate::ids::{NodeId, ReporterId, StationId};
use crate::wire::{
    ConsoleLine, HopUpdate, IgnoreUpdate, RankUpdate, StationSet, UpdatePayload, ViewerMessage,
    RAW_RECORD_TYPE,
};

/// Traffic group of decoded routing events.
pub const ROUTING_GROUP: &str = "rpl";

/// A message relayed between two mesh nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    /// Sending node.
    pub src: NodeId,
    /// Receiving node.
    pub dst: NodeId,
    /// Message kind (e.g. `DIO`).
    pub kind: String,
    /// Payload tag (e.g. `#color6`).
    pub payload: String,
    /// Reporter timestamp in milliseconds.
    pub time: i64,
}

/// A parent selected or dropped by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentChange {
    /// The node changing its parent.
    pub child: NodeId,
    /// The parent concerned.
    pub parent: NodeId,
    /// Reporter timestamp in milliseconds.
    pub time: i64,
}

/// A security alarm raised by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    /// Class token from the telemetry line.
    pub class: AlarmClass,
    /// Store severity derived from the class.
    pub severity: Severity,
    /// Human-readable description chosen for the class.
    pub description: String,
    /// The node that received the alarm packet.
    pub node: NodeId,
    /// Unix time in seconds at which the hub saw the alarm.
    pub time: i64,
}

/// A typed event decoded from reporter telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    /// A message hop between two nodes.
    Relay(Relay),
    /// A node selected a routing parent.
    ParentSelect(ParentChange),
    /// A node dropped a routing parent.
    ParentDelete(ParentChange),
    /// A node announced its rank.
    RankSet {
        /// The node.
        node: NodeId,
        /// Its rank.
        rank: u32,
    },
    /// A node ignores traffic from another node.
    IgnoreSet {
        /// The ignoring node.
        from: NodeId,
        /// The ignored node.
        to: NodeId,
    },
    /// A reporter declared its station.
    StationAssign {
        /// The reporter.
        reporter: ReporterId,
        /// The station.
        station: StationId,
    },
    /// A security alarm.
    Alarm(Alarm),
    /// Raw console text, passed through for display.
    Raw {
        /// The sending reporter.
        reporter: ReporterId,
        /// The line.
        text: String,
        /// Reporter timestamp in milliseconds.
        time: i64,
    },
}

impl DecodedEvent {
    /// Project the event onto the message viewers receive.
    ///
    /// Alarms have no direct projection: they go to the alarm forwarder,
    /// which emits its own notification.
    pub fn to_viewer_message(&self) -> Option<ViewerMessage> {
        let msg = match self {
            Self::Relay(relay) => ViewerMessage::Update(UpdatePayload::Hop(HopUpdate {
                hopsrc: relay.src.to_string(),
                hopdst: relay.dst.to_string(),
                group: ROUTING_GROUP.to_owned(),
                kind: relay.kind.clone(),
                payload: Some(serde_json::Value::String(relay.payload.clone())),
                time: relay.time,
            })),
            Self::ParentSelect(change) => parent_hop(change, "parent_select"),
            Self::ParentDelete(change) => parent_hop(change, "parent_delete"),
            Self::RankSet { node, rank } => ViewerMessage::Rank(RankUpdate {
                id: node.clone(),
                rank: *rank,
            }),
            Self::IgnoreSet { from, to } => ViewerMessage::Ignore(IgnoreUpdate {
                id: from.clone(),
                ignores: to.clone(),
            }),
            Self::StationAssign { reporter, station } => ViewerMessage::StationSet(StationSet {
                id: reporter.clone(),
                station: station.clone(),
            }),
            Self::Alarm(_) => return None,
            Self::Raw {
                reporter,
                text,
                time,
            } => ViewerMessage::Console(ConsoleLine {
                kind: RAW_RECORD_TYPE.to_owned(),
                data: text.clone(),
                node: reporter.clone(),
                time: *time,
            }),
        };
        Some(msg)
    }
}

fn parent_hop(change: &ParentChange, kind: &str) -> ViewerMessage {
    ViewerMessage::Update(UpdatePayload::Hop(HopUpdate {
        hopsrc: change.parent.to_string(),
        hopdst: change.child.to_string(),
        group: ROUTING_GROUP.to_owned(),
        kind: kind.to_owned(),
        payload: None,
        time: change.time,
    }))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parent_select_draws_edge_from_parent_to_child() {
        let event = DecodedEvent::ParentSelect(ParentChange {
            child: NodeId::new("sn4"),
            parent: NodeId::new("sn7"),
            time: 5,
        });
        let hop = match event.to_viewer_message() {
            Some(ViewerMessage::Update(UpdatePayload::Hop(hop))) => hop,
            other => panic!("Expected hop update, got {other:?}"),
        };
        assert_eq!(hop.hopsrc, "sn7");
        assert_eq!(hop.hopdst, "sn4");
        assert_eq!(hop.kind, "parent_select");
        assert_eq!(hop.group, ROUTING_GROUP);
    }

    #[test]
    fn alarms_are_not_projected() {
        let event = DecodedEvent::Alarm(Alarm {
            class: AlarmClass::Critical,
            severity: Severity::Extreme,
            description: "Intrusion Alert".to_owned(),
            node: NodeId::new("sn1"),
            time: 0,
        });
        assert!(event.to_viewer_message().is_none());
    }

    #[test]
    fn raw_becomes_console_line() {
        let event = DecodedEvent::Raw {
            reporter: ReporterId::new("10.0.0.2:5000"),
            text: "hello".to_owned(),
            time: 9,
        };
        let msg = event.to_viewer_message();
        assert_eq!(msg.as_ref().map(ViewerMessage::name), Some("console"));
    }
}
