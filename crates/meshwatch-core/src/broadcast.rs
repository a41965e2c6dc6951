//! Fan-out of hub events to viewers, and routing of console commands to
//! reporters.
//!
//! Each viewer owns a bounded queue. Delivery never waits: a viewer whose
//! queue is full is treated as gone and dropped, so one slow browser tab
//! cannot stall the hub.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use meshwatch_types::{ReporterCommand, ReporterId, ViewerId, ViewerMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::registry::Registry;

/// Receiving half of a viewer's queue.
pub type ViewerFeed = mpsc::Receiver<Arc<ViewerMessage>>;

/// A newly registered viewer.
#[derive(Debug)]
pub struct ViewerSubscription {
    /// Hub-assigned id, used to unsubscribe.
    pub id: ViewerId,
    /// Messages for this viewer, starting with its initial state.
    pub feed: ViewerFeed,
}

/// The set of connected viewers.
#[derive(Debug)]
pub struct Broadcaster {
    viewers: BTreeMap<ViewerId, mpsc::Sender<Arc<ViewerMessage>>>,
    capacity: usize,
    next_id: u64,
}

impl Broadcaster {
    /// Create a broadcaster whose viewers each buffer up to `capacity`
    /// messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            viewers: BTreeMap::new(),
            capacity: capacity.max(1),
            next_id: 0,
        }
    }

    /// Register a viewer and preload `initial` into its queue.
    ///
    /// The queue is sized so the initial messages never count against the
    /// live-event budget.
    pub fn subscribe(&mut self, initial: Vec<ViewerMessage>) -> ViewerSubscription {
        self.next_id = self.next_id.wrapping_add(1);
        let id = ViewerId(self.next_id);
        let (tx, feed) = mpsc::channel(self.capacity.saturating_add(initial.len()));

        for msg in initial {
            // Capacity covers every initial message.
            if tx.try_send(Arc::new(msg)).is_err() {
                tracing::warn!(viewer = %id, "Initial state did not fit viewer queue");
                break;
            }
        }

        self.viewers.insert(id, tx);
        tracing::debug!(viewer = %id, viewers = self.viewers.len(), "Viewer subscribed");
        ViewerSubscription { id, feed }
    }

    /// Remove a viewer. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: ViewerId) -> bool {
        let removed = self.viewers.remove(&id).is_some();
        if removed {
            tracing::debug!(viewer = %id, viewers = self.viewers.len(), "Viewer unsubscribed");
        }
        removed
    }

    /// Queue `msg` for every viewer.
    ///
    /// Viewers that are closed or whose queue is full are dropped. Returns
    /// the number of viewers the message was queued for.
    pub fn broadcast(&mut self, msg: ViewerMessage) -> usize {
        let msg = Arc::new(msg);
        let mut delivered: usize = 0;

        self.viewers.retain(|id, tx| match tx.try_send(Arc::clone(&msg)) {
            Ok(()) => {
                delivered = delivered.saturating_add(1);
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(viewer = %id, event = msg.name(), "Viewer queue full, disconnecting");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(viewer = %id, "Viewer gone, removing");
                false
            }
        });

        delivered
    }

    /// Send `payload` to each online reporter in `targets`.
    ///
    /// Targets that are not online, or whose link cannot take the command
    /// right now, are skipped. Duplicate targets receive the command once.
    /// Returns the number of reporters the command was queued for.
    pub fn route_command(registry: &Registry, targets: &[ReporterId], payload: &str) -> usize {
        let targets: BTreeSet<&ReporterId> = targets.iter().collect();
        let mut delivered: usize = 0;

        for target in targets {
            let Some(record) = registry.resolve(target) else {
                tracing::debug!(reporter = %target, "Command target not online, skipping");
                continue;
            };
            let command = ReporterCommand {
                data: payload.to_owned(),
            };
            match record.handle.try_send(command) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(reporter = %target, "Reporter command queue full, dropping command");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(reporter = %target, "Reporter link closing, skipping");
                }
            }
        }

        delivered
    }

    /// Number of connected viewers.
    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    /// Whether no viewer is connected.
    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use meshwatch_types::ReporterOffline;

    use super::*;

    fn offline(id: &str) -> ViewerMessage {
        ViewerMessage::Offline(ReporterOffline {
            id: ReporterId::new(id),
        })
    }

    #[test]
    fn initial_messages_come_first() {
        let mut broadcaster = Broadcaster::new(2);
        let mut sub = broadcaster.subscribe(vec![offline("a"), offline("b"), offline("c")]);
        assert_eq!(broadcaster.broadcast(offline("d")), 1);

        let mut seen = Vec::new();
        while let Ok(msg) = sub.feed.try_recv() {
            seen.push(msg);
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(*seen.last().unwrap().as_ref(), offline("d"));
    }

    #[test]
    fn full_viewer_is_dropped_without_affecting_others() {
        let mut broadcaster = Broadcaster::new(1);
        let _slow = broadcaster.subscribe(Vec::new());
        let mut fast = broadcaster.subscribe(Vec::new());

        assert_eq!(broadcaster.broadcast(offline("a")), 2);
        assert!(fast.feed.try_recv().is_ok());

        // The slow viewer never drains and overflows on the second event.
        assert_eq!(broadcaster.broadcast(offline("b")), 1);
        assert_eq!(broadcaster.len(), 1);
        assert!(fast.feed.try_recv().is_ok());
    }

    #[test]
    fn closed_viewer_is_dropped() {
        let mut broadcaster = Broadcaster::new(4);
        let sub = broadcaster.subscribe(Vec::new());
        drop(sub);
        assert_eq!(broadcaster.broadcast(offline("a")), 0);
        assert!(broadcaster.is_empty());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut broadcaster = Broadcaster::new(4);
        let sub = broadcaster.subscribe(Vec::new());
        assert!(broadcaster.unsubscribe(sub.id));
        assert!(!broadcaster.unsubscribe(sub.id));
    }

    #[test]
    fn commands_reach_only_live_targets() {
        let mut registry = Registry::new(true);
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let (a, _) = registry.connect(SocketAddr::from(([127, 0, 0, 1], 1)), tx_a, 0);
        let (b, _) = registry.connect(SocketAddr::from(([127, 0, 0, 1], 2)), tx_b, 0);

        let targets = vec![a.id.clone(), ReporterId::new("gone"), a.id.clone()];
        assert_eq!(Broadcaster::route_command(&registry, &targets, "reboot"), 1);
        assert_eq!(rx_a.try_recv().unwrap().data, "reboot");
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());

        assert_eq!(Broadcaster::route_command(&registry, &[b.id], "ping"), 1);
        assert_eq!(rx_b.try_recv().unwrap().data, "ping");
    }

    #[test]
    fn empty_target_list_delivers_nothing() {
        let registry = Registry::new(true);
        assert_eq!(Broadcaster::route_command(&registry, &[], "x"), 0);
    }
}
