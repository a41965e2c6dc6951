//! Registry of connected reporters and their stations.
//!
//! Every online reporter has exactly one [`ReporterRecord`], and every
//! online reporter is a member of the implicit `all` station. A reporter
//! may additionally belong to one named station, declared over its link
//! with a `station:` line.
//!
//! The registry is plain data. Each mutating call returns the lifecycle
//! message the caller must fan out to viewers.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;

use meshwatch_types::{
    ReporterCommand, ReporterId, ReporterOffline, ReporterOnline, ReporterSummary, StationId,
    StationSet, ViewerMessage,
};
use tokio::sync::mpsc;

/// Sending half of a reporter link's command queue.
pub type ReporterHandle = mpsc::Sender<ReporterCommand>;

/// State kept for one online reporter.
#[derive(Debug, Clone)]
pub struct ReporterRecord {
    /// The reporter.
    pub id: ReporterId,
    /// Queue feeding the reporter's link writer.
    pub handle: ReporterHandle,
    /// Named station, if one was declared.
    pub station: Option<StationId>,
    /// Connection time in milliseconds since the epoch.
    pub online_since: i64,
    session: u64,
}

impl ReporterRecord {
    /// Public summary of this record.
    pub fn summary(&self) -> ReporterSummary {
        ReporterSummary {
            id: self.id.clone(),
            station: self.station.clone(),
            since: self.online_since,
        }
    }
}

/// Proof of a particular connection's registration.
///
/// Two links from the same origin map to the same [`ReporterId`]. The lease
/// lets a closing link release its own registration without evicting a
/// newer link that took over the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterLease {
    /// The id the connection was registered under.
    pub id: ReporterId,
    session: u64,
}

/// Derive a reporter's id from its transport origin.
pub fn reporter_id_for(origin: SocketAddr, include_port: bool) -> ReporterId {
    if include_port {
        ReporterId::new(format!("{}:{}", origin.ip(), origin.port()))
    } else {
        ReporterId::new(origin.ip().to_string())
    }
}

/// Online reporters and station membership.
#[derive(Debug)]
pub struct Registry {
    reporters: BTreeMap<ReporterId, ReporterRecord>,
    stations: BTreeMap<StationId, BTreeSet<ReporterId>>,
    include_port: bool,
    next_session: u64,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(include_port: bool) -> Self {
        let mut stations = BTreeMap::new();
        stations.insert(StationId::all(), BTreeSet::new());
        Self {
            reporters: BTreeMap::new(),
            stations,
            include_port,
            next_session: 0,
        }
    }

    /// Register a newly accepted reporter link.
    ///
    /// A previous registration under the same id is replaced; its handle is
    /// dropped, which ends that link's writer.
    pub fn connect(
        &mut self,
        origin: SocketAddr,
        handle: ReporterHandle,
        online_since: i64,
    ) -> (ReporterLease, ViewerMessage) {
        let id = reporter_id_for(origin, self.include_port);
        if self.reporters.contains_key(&id) {
            tracing::warn!(reporter = %id, "Reporter id already online, replacing previous link");
            self.remove(&id);
        }

        self.next_session = self.next_session.wrapping_add(1);
        let record = ReporterRecord {
            id: id.clone(),
            handle,
            station: None,
            online_since,
            session: self.next_session,
        };
        let online = ReporterOnline::from(record.summary());
        self.reporters.insert(id.clone(), record);
        self.stations
            .entry(StationId::all())
            .or_default()
            .insert(id.clone());

        let lease = ReporterLease {
            id,
            session: self.next_session,
        };
        (lease, ViewerMessage::Online(online))
    }

    /// Remove a reporter regardless of which link registered it.
    ///
    /// Returns `None` if the reporter was not online, so calling this twice
    /// is harmless.
    pub fn disconnect(&mut self, id: &ReporterId) -> Option<ViewerMessage> {
        self.remove(id).map(|record| {
            ViewerMessage::Offline(ReporterOffline { id: record.id })
        })
    }

    /// Remove the registration held by `lease`, unless a newer link has
    /// replaced it.
    pub fn release(&mut self, lease: &ReporterLease) -> Option<ViewerMessage> {
        let current = self.reporters.get(&lease.id)?;
        if current.session != lease.session {
            return None;
        }
        self.disconnect(&lease.id)
    }

    /// Move a reporter into `station`, creating the station if needed.
    ///
    /// Assigning `all` clears any named station. Returns `None` if the
    /// reporter is not online.
    pub fn assign_station(
        &mut self,
        id: &ReporterId,
        station: StationId,
    ) -> Option<ViewerMessage> {
        let record = self.reporters.get_mut(id)?;
        let previous = record.station.take();
        if !station.is_all() {
            record.station = Some(station.clone());
        }

        if let Some(previous) = previous {
            leave_station(&mut self.stations, &previous, id);
        }
        self.stations
            .entry(station.clone())
            .or_default()
            .insert(id.clone());

        Some(ViewerMessage::StationSet(StationSet {
            id: id.clone(),
            station,
        }))
    }

    /// Ids of every online reporter.
    pub fn list_online(&self) -> BTreeSet<ReporterId> {
        self.reporters.keys().cloned().collect()
    }

    /// Look up an online reporter.
    pub fn resolve(&self, id: &ReporterId) -> Option<&ReporterRecord> {
        self.reporters.get(id)
    }

    /// Summaries of every online reporter, ordered by id.
    pub fn summaries(&self) -> Vec<ReporterSummary> {
        self.reporters.values().map(ReporterRecord::summary).collect()
    }

    /// Station membership, including `all`.
    pub const fn stations(&self) -> &BTreeMap<StationId, BTreeSet<ReporterId>> {
        &self.stations
    }

    /// Number of online reporters.
    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    /// Whether no reporter is online.
    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }

    fn remove(&mut self, id: &ReporterId) -> Option<ReporterRecord> {
        let record = self.reporters.remove(id)?;
        leave_station(&mut self.stations, &StationId::all(), id);
        if let Some(station) = &record.station {
            leave_station(&mut self.stations, station, id);
        }
        Some(record)
    }
}

/// Drop `id` from `station`, pruning named stations that become empty.
fn leave_station(
    stations: &mut BTreeMap<StationId, BTreeSet<ReporterId>>,
    station: &StationId,
    id: &ReporterId,
) {
    let Some(members) = stations.get_mut(station) else {
        return;
    };
    members.remove(id);
    if members.is_empty() && !station.is_all() {
        stations.remove(station);
    }
}
