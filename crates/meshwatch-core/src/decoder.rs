//! Positional decoder for reporter telemetry lines.
//!
//! Mesh nodes print human-readable log lines such as
//! `m: ID sn4 received msg DIO from ID sn7 #color6`. The first token
//! selects the line kind and every field sits at a fixed token position
//! after splitting on single spaces.
//!
//! | Keyword    | Min tokens | Fields                                   |
//! |------------|-----------:|------------------------------------------|
//! | `m:`       | 10         | dst `[2]`, kind `[5]`, src `[8]`, payload `[9]` |
//! | `p_s:`     | 6          | child `[2]`, parent `[5]`                |
//! | `p_d:`     | 6          | child `[2]`, parent `[5]`                |
//! | `d:`       | 6          | node `[2]`, class `[5]`                  |
//! | `r:`       | 6          | node `[2]`, rank `[5]`                   |
//! | `i:`       | 6          | from `[2]`, to `[5]`                     |
//! | `station:` | 2          | station `[1]`                            |
//!
//! Anything else, including a known keyword with too few tokens, decodes to
//! `None`. Informational device output is common and is not an error.

use meshwatch_types::{
    Alarm, AlarmClass, DecodedEvent, NodeId, ParentChange, Relay, ReporterId, StationId,
};

/// The fields of one recognised telemetry line.
///
/// A directive carries only what the line itself says. The reporter and
/// timestamp are attached by [`Directive::into_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `m:` -- a message relayed from `src` to `dst`.
    Relay {
        /// Sending node.
        src: NodeId,
        /// Receiving node.
        dst: NodeId,
        /// Message kind.
        kind: String,
        /// Payload tag.
        payload: String,
    },
    /// `p_s:` -- `child` selected `parent`.
    ParentSelect {
        /// The child node.
        child: NodeId,
        /// The selected parent.
        parent: NodeId,
    },
    /// `p_d:` -- `child` dropped `parent`.
    ParentDelete {
        /// The child node.
        child: NodeId,
        /// The dropped parent.
        parent: NodeId,
    },
    /// `d:` -- `node` received an alarm of `class`.
    Alarm {
        /// Alarm class.
        class: AlarmClass,
        /// Receiving node.
        node: NodeId,
    },
    /// `r:` -- `node` announced `rank`.
    RankSet {
        /// The node.
        node: NodeId,
        /// Its rank.
        rank: u32,
    },
    /// `i:` -- `from` ignores `to`.
    IgnoreSet {
        /// The ignoring node.
        from: NodeId,
        /// The ignored node.
        to: NodeId,
    },
    /// `station:` -- the sending reporter belongs to `station`.
    StationAssign {
        /// The station name.
        station: StationId,
    },
}

/// Decode one telemetry line.
///
/// The line must not carry its trailing delimiter. Returns `None` for
/// unrecognised or truncated lines, and for `d:` lines with an unknown
/// class or `r:` lines whose rank is not a number.
pub fn decode(line: &str) -> Option<Directive> {
    let tokens: Vec<&str> = line.split(' ').collect();
    let field = |index: usize| tokens.get(index).copied();

    match field(0)? {
        "m:" if tokens.len() >= 10 => Some(Directive::Relay {
            src: NodeId::new(field(8)?),
            dst: NodeId::new(field(2)?),
            kind: field(5)?.to_owned(),
            payload: field(9)?.to_owned(),
        }),
        "p_s:" if tokens.len() >= 6 => Some(Directive::ParentSelect {
            child: NodeId::new(field(2)?),
            parent: NodeId::new(field(5)?),
        }),
        "p_d:" if tokens.len() >= 6 => Some(Directive::ParentDelete {
            child: NodeId::new(field(2)?),
            parent: NodeId::new(field(5)?),
        }),
        "d:" if tokens.len() >= 6 => Some(Directive::Alarm {
            class: AlarmClass::from_token(field(5)?)?,
            node: NodeId::new(field(2)?),
        }),
        "r:" if tokens.len() >= 6 => Some(Directive::RankSet {
            node: NodeId::new(field(2)?),
            rank: field(5)?.parse().ok()?,
        }),
        "i:" if tokens.len() >= 6 => Some(Directive::IgnoreSet {
            from: NodeId::new(field(2)?),
            to: NodeId::new(field(5)?),
        }),
        "station:" if tokens.len() >= 2 => Some(Directive::StationAssign {
            station: StationId::new(field(1)?),
        }),
        _ => None,
    }
}

impl Directive {
    /// Attach the sending reporter and timestamp, producing a
    /// [`DecodedEvent`].
    ///
    /// Alarm lines are built by `raise_alarm`, which owns the description
    /// text and the alarm clock.
    pub fn into_event(
        self,
        reporter: &ReporterId,
        time: i64,
        raise_alarm: impl FnOnce(AlarmClass, NodeId) -> Alarm,
    ) -> DecodedEvent {
        match self {
            Self::Relay {
                src,
                dst,
                kind,
                payload,
            } => DecodedEvent::Relay(Relay {
                src,
                dst,
                kind,
                payload,
                time,
            }),
            Self::ParentSelect { child, parent } => {
                DecodedEvent::ParentSelect(ParentChange {
                    child,
                    parent,
                    time,
                })
            }
            Self::ParentDelete { child, parent } => {
                DecodedEvent::ParentDelete(ParentChange {
                    child,
                    parent,
                    time,
                })
            }
            Self::Alarm { class, node } => DecodedEvent::Alarm(raise_alarm(class, node)),
            Self::RankSet { node, rank } => DecodedEvent::RankSet { node, rank },
            Self::IgnoreSet { from, to } => DecodedEvent::IgnoreSet { from, to },
            Self::StationAssign { station } => DecodedEvent::StationAssign {
                reporter: reporter.clone(),
                station,
            },
        }
    }
}
