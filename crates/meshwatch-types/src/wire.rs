//! Messages exchanged with reporters and viewers.
//!
//! Reporters speak length-framed JSON records (see the codec in
//! `meshwatch-core`). Viewers receive JSON text frames of the shape
//! `{"event": <name>, "data": <payload>}`, modelled here by
//! [`ViewerMessage`].

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use ts_rs::TS;

use crate::ids::{NodeId, ReporterId, StationId};

// ---------------------------------------------------------------------------
// Reporter side
// ---------------------------------------------------------------------------

/// Record `type` tag for raw telemetry.
pub const RAW_RECORD_TYPE: &str = "raw";

/// One raw telemetry line sent by a reporter.
///
/// Serialized as `{"type":"raw","data":..,"time":..}`. On the way in the
/// `type` tag is checked by the codec before this struct is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    /// The line as read from the device, without its delimiter.
    pub data: String,
    /// Reporter-side timestamp in milliseconds since the epoch.
    #[serde(default)]
    pub time: Option<i64>,
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("RawRecord", 3)?;
        record.serialize_field("type", RAW_RECORD_TYPE)?;
        record.serialize_field("data", &self.data)?;
        match self.time {
            Some(time) => record.serialize_field("time", &time)?,
            None => record.skip_field("time")?,
        }
        record.end()
    }
}

/// A command pushed from the hub down to one reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterCommand {
    /// Text to hand to the device.
    pub data: String,
}

// ---------------------------------------------------------------------------
// Viewer side
// ---------------------------------------------------------------------------

/// A console command sent by a viewer for a set of reporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConsoleCommand {
    /// Target reporters. Ids that are not online are skipped.
    pub dst: Vec<ReporterId>,
    /// Payload delivered to each target.
    pub data: String,
}

/// Frames a viewer may send to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ViewerRequest {
    /// Route a console command to reporters.
    Console(ConsoleCommand),
}

/// Everything the hub pushes to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ViewerMessage {
    /// Current state, sent once when a viewer connects.
    Init(TopologySnapshot),
    /// A topology or traffic update.
    Update(UpdatePayload),
    /// A reporter came online.
    Online(ReporterOnline),
    /// A reporter went offline.
    Offline(ReporterOffline),
    /// A reporter joined a station.
    StationSet(StationSet),
    /// A node announced its rank.
    Rank(RankUpdate),
    /// A node started ignoring another node.
    Ignore(IgnoreUpdate),
    /// Raw console text from a reporter.
    Console(ConsoleLine),
}

impl ViewerMessage {
    /// The `event` name used on the wire.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Update(_) => "update",
            Self::Online(_) => "online",
            Self::Offline(_) => "offline",
            Self::StationSet(_) => "stationSet",
            Self::Rank(_) => "rank",
            Self::Ignore(_) => "ignore",
            Self::Console(_) => "console",
        }
    }
}

/// Last-known routing state of one mesh node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TopologyEntry {
    /// The node.
    pub id: NodeId,
    /// Announced routing rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    /// Currently selected parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
}

impl TopologyEntry {
    /// A fresh entry with no rank and no parent.
    pub const fn new(id: NodeId) -> Self {
        Self {
            id,
            rank: None,
            parent: None,
        }
    }
}

/// A directed edge whose relays are hidden from viewers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IgnoreEdge {
    /// The ignoring node.
    pub from: NodeId,
    /// The ignored node.
    pub to: NodeId,
}

/// Summary of an online reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ReporterSummary {
    /// The reporter.
    pub id: ReporterId,
    /// Assigned station, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<StationId>,
    /// Connection time in milliseconds since the epoch.
    #[ts(type = "number")]
    pub since: i64,
}

/// Payload of the `init` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TopologySnapshot {
    /// Every node ever observed, ordered by id.
    pub nodes: Vec<TopologyEntry>,
    /// Active ignore edges, ordered.
    pub ignores: Vec<IgnoreEdge>,
    /// Online reporters, ordered by id.
    pub reporters: Vec<ReporterSummary>,
}

/// Payload of the `update` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/")]
pub enum UpdatePayload {
    /// A hop between two nodes, decoded by the hub.
    Hop(HopUpdate),
    /// A structured record forwarded verbatim from a reporter.
    Record(serde_json::Value),
}

/// A single hop drawn by the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HopUpdate {
    /// Sending node.
    pub hopsrc: String,
    /// Receiving node.
    pub hopdst: String,
    /// Traffic group (`rpl` or `evt`).
    pub group: String,
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional payload tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Timestamp as supplied by the source.
    #[ts(type = "number")]
    pub time: i64,
}

/// Payload of the `online` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ReporterOnline {
    /// The reporter.
    pub id: ReporterId,
    /// Assigned station, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<StationId>,
    /// Connection time in milliseconds since the epoch.
    #[ts(type = "number")]
    pub since: i64,
    /// Extra reporter information. Currently always empty.
    #[serde(default)]
    pub info: BTreeMap<String, String>,
}

impl From<ReporterSummary> for ReporterOnline {
    fn from(summary: ReporterSummary) -> Self {
        Self {
            id: summary.id,
            station: summary.station,
            since: summary.since,
            info: BTreeMap::new(),
        }
    }
}

/// Payload of the `offline` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ReporterOffline {
    /// The reporter.
    pub id: ReporterId,
}

/// Payload of the `stationSet` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StationSet {
    /// The reporter.
    pub id: ReporterId,
    /// Its new station.
    pub station: StationId,
}

/// Payload of the `rank` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RankUpdate {
    /// The node.
    pub id: NodeId,
    /// Its rank.
    pub rank: u32,
}

/// Payload of the `ignore` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IgnoreUpdate {
    /// The ignoring node.
    pub id: NodeId,
    /// The node being ignored.
    pub ignores: NodeId,
}

/// Payload of the `console` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConsoleLine {
    /// Record type, always `raw`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The raw line.
    pub data: String,
    /// Reporter that sent the line.
    pub node: ReporterId,
    /// Timestamp in milliseconds since the epoch.
    #[ts(type = "number")]
    pub time: i64,
}
