//! Alarm classification and the durable alarm record.
//!
//! Reporters flag security-relevant packets with a `d:` line carrying a
//! severity class. The hub maps the class onto a store severity and
//! writes an [`AlarmRecord`] to the external alarm store.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Severity class as reported on a `d:` telemetry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum AlarmClass {
    /// `crit` -- a critical event such as an intrusion.
    #[serde(rename = "crit")]
    Critical,
    /// `evt` -- a noteworthy event that may indicate a breach.
    #[serde(rename = "evt")]
    Event,
}

impl AlarmClass {
    /// Parse the class token used on the wire.
    ///
    /// Returns `None` for any token other than `crit` or `evt`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "crit" => Some(Self::Critical),
            "evt" => Some(Self::Event),
            _ => None,
        }
    }

    /// The wire token for this class.
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Critical => "crit",
            Self::Event => "evt",
        }
    }

    /// Severity recorded in the alarm store for this class.
    pub const fn severity(self) -> Severity {
        match self {
            Self::Critical => Severity::Extreme,
            Self::Event => Severity::Moderate,
        }
    }
}

/// Severity of a stored alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Severity {
    /// Requires immediate response.
    Extreme,
    /// Worth investigating.
    Moderate,
}

/// The record written to the external alarm store.
///
/// Field names match the store consumer's expectations, hence `oid` and
/// the `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AlarmRecord {
    /// Record type tag, always `Alarm`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Unique id of the form `<prefix>_<unix seconds>`. Also the store key.
    pub oid: String,
    /// Causing records. Always empty for hub-generated alarms.
    pub causes: Vec<String>,
    /// Human-readable description.
    pub description: String,
    /// Fixed label naming the sensing source.
    pub source: String,
    /// Mapped severity.
    pub severity: Severity,
    /// Unix time in seconds.
    #[ts(type = "number")]
    pub timestamp: i64,
}

/// Value of [`AlarmRecord::kind`].
pub const ALARM_RECORD_KIND: &str = "Alarm";

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn class_tokens_map_to_severities() {
        assert_eq!(AlarmClass::from_token("crit"), Some(AlarmClass::Critical));
        assert_eq!(AlarmClass::from_token("evt"), Some(AlarmClass::Event));
        assert_eq!(AlarmClass::from_token("warn"), None);
        assert_eq!(AlarmClass::Critical.severity(), Severity::Extreme);
        assert_eq!(AlarmClass::Event.severity(), Severity::Moderate);
    }

    #[test]
    fn record_uses_store_field_names() {
        let record = AlarmRecord {
            kind: ALARM_RECORD_KIND.to_owned(),
            oid: "fence01_1700000000".to_owned(),
            causes: Vec::new(),
            description: "Intrusion Alert".to_owned(),
            source: "fnode_023".to_owned(),
            severity: Severity::Extreme,
            timestamp: 1_700_000_000,
        };
        let value = serde_json::to_value(&record).unwrap_or_default();
        assert_eq!(value["type"], "Alarm");
        assert_eq!(value["severity"], "extreme");
        assert_eq!(value["causes"], serde_json::json!([]));
        assert_eq!(value["timestamp"], 1_700_000_000);
    }
}
