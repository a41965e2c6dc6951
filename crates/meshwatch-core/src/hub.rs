//! The shared hub state.
//!
//! [`Hub`] owns the reporter registry, the topology, and the viewer set
//! behind one lock. Every mutation and the fan-out it causes happen while
//! the lock is held, so:
//!
//! - viewers see events in the order they were applied, and
//! - a viewer subscribing takes its `init` snapshot and joins the viewer
//!   set atomically, never missing or duplicating an event.
//!
//! Fan-out never blocks (see [`crate::broadcast`]), so holding the lock
//! across it is cheap.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use meshwatch_types::{
    ConsoleCommand, DecodedEvent, ReporterId, ReporterOnline, ReporterSummary, StationId,
    TopologySnapshot, ViewerId, ViewerMessage,
};
use tokio::sync::Mutex;

use crate::broadcast::{Broadcaster, ViewerSubscription};
use crate::config::HubSettings;
use crate::registry::{Registry, ReporterHandle, ReporterLease};
use crate::topology::Topology;

#[derive(Debug)]
struct HubInner {
    registry: Registry,
    topology: Topology,
    broadcaster: Broadcaster,
}

/// Registry, topology, and viewers of one anchor.
#[derive(Debug)]
pub struct Hub {
    inner: Mutex<HubInner>,
}

impl Hub {
    /// Create an empty hub.
    pub fn new(settings: &HubSettings) -> Self {
        Self {
            inner: Mutex::new(HubInner {
                registry: Registry::new(settings.reporter_id_includes_port),
                topology: Topology::new(),
                broadcaster: Broadcaster::new(settings.viewer_buffer),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Reporters
    // -----------------------------------------------------------------------

    /// Register a reporter link and announce it to viewers.
    pub async fn connect_reporter(
        &self,
        origin: SocketAddr,
        handle: ReporterHandle,
    ) -> ReporterLease {
        let now = chrono::Utc::now().timestamp_millis();
        let mut inner = self.inner.lock().await;
        let (lease, online) = inner.registry.connect(origin, handle, now);
        inner.broadcaster.broadcast(online);
        lease
    }

    /// Release a link's registration and announce the reporter offline.
    ///
    /// Does nothing if a newer link has taken over the id. Returns whether
    /// the reporter went offline.
    pub async fn release_reporter(&self, lease: &ReporterLease) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(offline) = inner.registry.release(lease) else {
            return false;
        };
        inner.broadcaster.broadcast(offline);
        true
    }

    /// Remove a reporter and announce it offline.
    ///
    /// Idempotent. Returns whether the reporter was online.
    pub async fn disconnect_reporter(&self, id: &ReporterId) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(offline) = inner.registry.disconnect(id) else {
            return false;
        };
        inner.broadcaster.broadcast(offline);
        true
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Apply a decoded event to hub state and fan it out to viewers.
    ///
    /// Relays crossing an ignored edge update nothing but node presence and
    /// are not fanned out. Alarms are not handled here; they go through the
    /// alert forwarder. Returns the number of viewers reached.
    pub async fn apply(&self, event: DecodedEvent) -> usize {
        let mut inner = self.inner.lock().await;
        let HubInner {
            registry,
            topology,
            broadcaster,
        } = &mut *inner;

        let msg = match &event {
            DecodedEvent::Relay(relay) => {
                topology.observe(&relay.src);
                topology.observe(&relay.dst);
                if topology.is_suppressed(relay) {
                    tracing::trace!(src = %relay.src, dst = %relay.dst, "Relay on ignored edge suppressed");
                    return 0;
                }
                event.to_viewer_message()
            }
            DecodedEvent::ParentSelect(change) => {
                topology.set_parent(&change.child, &change.parent);
                event.to_viewer_message()
            }
            DecodedEvent::ParentDelete(change) => {
                topology.remove_parent(&change.child, &change.parent);
                event.to_viewer_message()
            }
            DecodedEvent::RankSet { node, rank } => {
                topology.set_rank(node, *rank);
                event.to_viewer_message()
            }
            DecodedEvent::IgnoreSet { from, to } => {
                topology.add_ignore(from, to);
                event.to_viewer_message()
            }
            DecodedEvent::StationAssign { reporter, station } => {
                let assigned = registry.assign_station(reporter, station.clone());
                if assigned.is_none() {
                    tracing::debug!(reporter = %reporter, "Station for offline reporter ignored");
                }
                assigned
            }
            DecodedEvent::Raw { .. } => event.to_viewer_message(),
            DecodedEvent::Alarm(alarm) => {
                tracing::debug!(node = %alarm.node, "Alarm reached hub directly, not fanned out");
                None
            }
        };

        msg.map_or(0, |msg| broadcaster.broadcast(msg))
    }

    /// Fan out a message that does not change hub state.
    pub async fn publish(&self, msg: ViewerMessage) -> usize {
        self.inner.lock().await.broadcaster.broadcast(msg)
    }

    // -----------------------------------------------------------------------
    // Viewers
    // -----------------------------------------------------------------------

    /// Register a viewer.
    ///
    /// Its feed starts with `init`, followed by one `online` per reporter,
    /// then every event applied after this call.
    pub async fn subscribe_viewer(&self) -> ViewerSubscription {
        let mut inner = self.inner.lock().await;
        let snapshot = snapshot_of(&inner);

        let mut initial = Vec::with_capacity(snapshot.reporters.len().saturating_add(1));
        let online: Vec<ViewerMessage> = snapshot
            .reporters
            .iter()
            .cloned()
            .map(|summary| ViewerMessage::Online(ReporterOnline::from(summary)))
            .collect();
        initial.push(ViewerMessage::Init(snapshot));
        initial.extend(online);

        inner.broadcaster.subscribe(initial)
    }

    /// Remove a viewer.
    pub async fn unsubscribe_viewer(&self, id: ViewerId) -> bool {
        self.inner.lock().await.broadcaster.unsubscribe(id)
    }

    /// Route a viewer's console command. Returns the number of reporters
    /// the command was queued for.
    pub async fn route_command(&self, command: &ConsoleCommand) -> usize {
        let inner = self.inner.lock().await;
        Broadcaster::route_command(&inner.registry, &command.dst, &command.data)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current topology and online reporters.
    pub async fn snapshot(&self) -> TopologySnapshot {
        let inner = self.inner.lock().await;
        snapshot_of(&inner)
    }

    /// Online reporters, ordered by id.
    pub async fn reporters(&self) -> Vec<ReporterSummary> {
        self.inner.lock().await.registry.summaries()
    }

    /// Station membership, including `all`.
    pub async fn stations(&self) -> BTreeMap<StationId, Vec<ReporterId>> {
        self.inner
            .lock()
            .await
            .registry
            .stations()
            .iter()
            .map(|(station, members)| (station.clone(), members.iter().cloned().collect()))
            .collect()
    }

    /// Number of connected viewers.
    pub async fn viewer_count(&self) -> usize {
        self.inner.lock().await.broadcaster.len()
    }
}

fn snapshot_of(inner: &HubInner) -> TopologySnapshot {
    TopologySnapshot {
        nodes: inner.topology.snapshot(),
        ignores: inner.topology.ignores(),
        reporters: inner.registry.summaries(),
    }
}
