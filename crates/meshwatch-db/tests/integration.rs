//! Integration tests for the `meshwatch-db` alarm store.
//!
//! These tests require a live Dragonfly (or Redis) instance on the default
//! port. Run with:
//!
//! ```bash
//! docker run -d -p 6379:6379 docker.dragonflydb.io/dragonflydb/dragonfly
//! cargo test -p meshwatch-db -- --ignored
//! ```
//!
//! All tests are marked `#[ignore]` so they are skipped during normal
//! `cargo test` runs.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use fred::prelude::*;
use meshwatch_core::config::AlarmConfig;
use meshwatch_core::{AlarmSink, AlertForwarder};
use meshwatch_db::{AlarmStore, DbError};
use meshwatch_types::{AlarmClass, NodeId, Severity};

fn config() -> AlarmConfig {
    AlarmConfig {
        channel: "meshwatch-test".to_owned(),
        id_prefix: "test01".to_owned(),
        ..AlarmConfig::default()
    }
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance (docker compose up -d)"]
async fn alarm_roundtrip() {
    let config = config();
    let store = AlarmStore::connect(&config)
        .await
        .expect("Failed to connect to Dragonfly");
    let forwarder = AlertForwarder::new(config.clone(), std::sync::Arc::new(store.clone()));

    let alarm = forwarder.raise_at(AlarmClass::Critical, NodeId::new("sn1"), 1_700_000_001);
    let record = forwarder.record(&alarm);
    store.store_alarm(&record).await.expect("Failed to store alarm");

    let loaded = store
        .load_alarm(&record.oid)
        .await
        .expect("Failed to load alarm");
    assert_eq!(loaded, record);
    assert_eq!(loaded.severity, Severity::Extreme);

    let subject: Option<String> = store
        .client()
        .hget(record.oid.as_str(), "subject")
        .await
        .expect("Failed to read subject");
    assert_eq!(subject.as_deref(), Some("safest"));

    store.delete_alarm(&record.oid).await.expect("Failed to delete");
    let missing = store.load_alarm(&record.oid).await;
    assert!(matches!(missing, Err(DbError::KeyNotFound(_))));
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance (docker compose up -d)"]
async fn alarm_id_is_published() {
    let config = config();
    let store = AlarmStore::connect(&config)
        .await
        .expect("Failed to connect to Dragonfly");

    let subscriber = Builder::from_config(Config::from_url(&config.store_url).unwrap())
        .build()
        .expect("Failed to build subscriber");
    subscriber.init().await.expect("Failed to connect subscriber");
    let mut messages = subscriber.message_rx();
    subscriber
        .subscribe(config.channel.as_str())
        .await
        .expect("Failed to subscribe");

    let forwarder = AlertForwarder::new(config.clone(), std::sync::Arc::new(store.clone()));
    let alarm = forwarder.raise_at(AlarmClass::Event, NodeId::new("sn2"), 1_700_000_002);
    let record = forwarder.record(&alarm);
    store.submit(record.clone());

    let message = tokio::time::timeout(Duration::from_secs(5), messages.recv())
        .await
        .expect("Timed out waiting for publish")
        .expect("Subscriber closed");
    let oid: String = message.value.convert().expect("Non-string message");
    assert_eq!(oid, record.oid);

    let loaded = store.load_alarm(&oid).await.expect("Failed to load alarm");
    assert_eq!(loaded.severity, Severity::Moderate);

    store.delete_alarm(&oid).await.expect("Failed to delete");
}

#[tokio::test]
async fn invalid_url_is_a_config_error() {
    let config = AlarmConfig {
        store_url: "not a url".to_owned(),
        ..AlarmConfig::default()
    };
    let result = AlarmStore::connect(&config).await;
    assert!(matches!(result, Err(DbError::Config(_))));
}
