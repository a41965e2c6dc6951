//! End-to-end tests of the reporter side of the hub over loopback TCP.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use meshwatch_core::codec::encode_json;
use meshwatch_core::{
    AlarmConfig, AlarmSink, AlertForwarder, FrameCodec, Hub, HubSettings, ReporterService,
    ViewerFeed,
};
use meshwatch_types::{
    AlarmRecord, ConsoleCommand, RawRecord, ReporterCommand, Severity, UpdatePayload,
    ViewerMessage,
};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<AlarmRecord>>,
}

impl AlarmSink for RecordingSink {
    fn submit(&self, record: AlarmRecord) {
        self.records.lock().unwrap().push(record);
    }
}

struct Harness {
    hub: Arc<Hub>,
    sink: Arc<RecordingSink>,
    addr: std::net::SocketAddr,
    shutdown: CancellationToken,
}

async fn start() -> Harness {
    let settings = HubSettings::default();
    let hub = Arc::new(Hub::new(&settings));
    let sink = Arc::new(RecordingSink::default());
    let alerts = Arc::new(AlertForwarder::new(AlarmConfig::default(), sink.clone()));
    let service = ReporterService::new(Arc::clone(&hub), alerts, &settings);

    let listener = meshwatch_core::connection::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(service.serve(listener, shutdown.clone()));

    Harness {
        hub,
        sink,
        addr,
        shutdown,
    }
}

type Link = Framed<TcpStream, FrameCodec>;

async fn connect(addr: std::net::SocketAddr) -> Link {
    let stream = TcpStream::connect(addr).await.unwrap();
    Framed::new(stream, FrameCodec::new(64 * 1024))
}

async fn send_line(link: &mut Link, line: &str) {
    let record = RawRecord {
        data: line.to_owned(),
        time: Some(1_000),
    };
    link.send(encode_json(&record).unwrap()).await.unwrap();
}

async fn next(feed: &mut ViewerFeed) -> Arc<ViewerMessage> {
    tokio::time::timeout(Duration::from_secs(2), feed.recv())
        .await
        .unwrap()
        .unwrap()
}

async fn next_non_console(feed: &mut ViewerFeed) -> Arc<ViewerMessage> {
    loop {
        let msg = next(feed).await;
        if !matches!(msg.as_ref(), ViewerMessage::Console(_)) {
            return msg;
        }
    }
}

#[tokio::test]
async fn reporter_lifecycle_is_announced() {
    let harness = start().await;
    let mut viewer = harness.hub.subscribe_viewer().await;
    assert_eq!(next(&mut viewer.feed).await.name(), "init");

    let link = connect(harness.addr).await;
    let online = next(&mut viewer.feed).await;
    let ViewerMessage::Online(online) = online.as_ref() else {
        panic!("Expected online, got {online:?}");
    };
    assert!(online.id.as_str().starts_with("127.0.0.1:"));
    assert!(online.station.is_none());

    drop(link);
    let offline = next(&mut viewer.feed).await;
    match offline.as_ref() {
        ViewerMessage::Offline(offline) => assert_eq!(offline.id, online.id),
        other => panic!("Expected offline, got {other:?}"),
    }
    assert!(harness.hub.reporters().await.is_empty());
    harness.shutdown.cancel();
}

#[tokio::test]
async fn parent_select_reaches_viewer_and_topology() {
    let harness = start().await;
    let mut viewer = harness.hub.subscribe_viewer().await;
    let _init = next(&mut viewer.feed).await;

    let mut link = connect(harness.addr).await;
    let _online = next(&mut viewer.feed).await;
    send_line(&mut link, "p_s: ID sn4 selected ID sn7 as parent").await;

    let console = next(&mut viewer.feed).await;
    assert_eq!(console.name(), "console");
    let update = next(&mut viewer.feed).await;
    match update.as_ref() {
        ViewerMessage::Update(UpdatePayload::Hop(hop)) => {
            assert_eq!(hop.hopsrc, "sn7");
            assert_eq!(hop.hopdst, "sn4");
            assert_eq!(hop.kind, "parent_select");
            assert_eq!(hop.time, 1_000);
        }
        other => panic!("Expected hop update, got {other:?}"),
    }

    let snapshot = harness.hub.snapshot().await;
    let sn4 = snapshot.nodes.iter().find(|e| e.id.as_str() == "sn4").unwrap();
    assert_eq!(sn4.parent.as_ref().map(|p| p.as_str()), Some("sn7"));
    harness.shutdown.cancel();
}

#[tokio::test]
async fn per_reporter_order_is_preserved() {
    let harness = start().await;
    let mut viewer = harness.hub.subscribe_viewer().await;
    let _init = next(&mut viewer.feed).await;

    let mut link = connect(harness.addr).await;
    let _online = next(&mut viewer.feed).await;
    for rank in 1..=20 {
        send_line(&mut link, &format!("r: ID sn1 selected rank {rank}")).await;
    }

    let mut ranks = Vec::new();
    while ranks.len() < 20 {
        if let ViewerMessage::Rank(update) = next_non_console(&mut viewer.feed).await.as_ref() {
            ranks.push(update.rank);
        }
    }
    assert_eq!(ranks, (1..=20).collect::<Vec<u32>>());
    harness.shutdown.cancel();
}

#[tokio::test]
async fn alarm_goes_to_store_not_to_update_payload() {
    let harness = start().await;
    let mut viewer = harness.hub.subscribe_viewer().await;
    let _init = next(&mut viewer.feed).await;

    let mut link = connect(harness.addr).await;
    let _online = next(&mut viewer.feed).await;
    send_line(&mut link, "d: ID sn1 received event crit").await;

    let notification = next_non_console(&mut viewer.feed).await;
    match notification.as_ref() {
        ViewerMessage::Update(UpdatePayload::Hop(hop)) => {
            assert_eq!((hop.hopsrc.as_str(), hop.hopdst.as_str()), ("gw", "store"));
            assert_eq!(hop.group, "evt");
            assert_eq!(hop.payload, Some(serde_json::json!({})));
        }
        other => panic!("Expected alarm notification, got {other:?}"),
    }

    let records = harness.sink.records.lock().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].severity, Severity::Extreme);
    assert!(records[0].oid.starts_with("fence01_"));
    harness.shutdown.cancel();
}

#[tokio::test]
async fn console_command_reaches_only_targeted_reporter() {
    let harness = start().await;
    let mut viewer = harness.hub.subscribe_viewer().await;
    let _init = next(&mut viewer.feed).await;

    let mut a = connect(harness.addr).await;
    let a_id = match next(&mut viewer.feed).await.as_ref() {
        ViewerMessage::Online(online) => online.id.clone(),
        other => panic!("Expected online, got {other:?}"),
    };
    let mut b = connect(harness.addr).await;
    let _b_online = next(&mut viewer.feed).await;

    let delivered = harness
        .hub
        .route_command(&ConsoleCommand {
            dst: vec![a_id],
            data: "reboot".to_owned(),
        })
        .await;
    assert_eq!(delivered, 1);

    let frame = tokio::time::timeout(Duration::from_secs(2), a.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let command: ReporterCommand = serde_json::from_slice(&frame).unwrap();
    assert_eq!(command.data, "reboot");

    let nothing = tokio::time::timeout(Duration::from_millis(100), b.next()).await;
    assert!(nothing.is_err(), "untargeted reporter received a command");
    harness.shutdown.cancel();
}

#[tokio::test]
async fn bad_frame_prefix_closes_only_that_link() {
    let harness = start().await;
    let mut viewer = harness.hub.subscribe_viewer().await;
    let _init = next(&mut viewer.feed).await;

    let mut good = connect(harness.addr).await;
    let _good_online = next(&mut viewer.feed).await;

    let mut bad = TcpStream::connect(harness.addr).await.unwrap();
    let _bad_online = next(&mut viewer.feed).await;
    tokio::io::AsyncWriteExt::write_all(&mut bad, b"abc#{}").await.unwrap();
    assert_eq!(next(&mut viewer.feed).await.name(), "offline");

    send_line(&mut good, "r: ID sn2 selected rank 7").await;
    assert_eq!(next_non_console(&mut viewer.feed).await.name(), "rank");
    assert_eq!(harness.hub.reporters().await.len(), 1);
    harness.shutdown.cancel();
}
