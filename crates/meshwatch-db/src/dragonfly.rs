//! `Dragonfly` (Redis-compatible) alarm store.
//!
//! Each alarm is a hash keyed by its `oid`. After the hash is written the
//! `oid` is published on the alarm channel so subscribers can fetch it.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `{oid}` | Hash | `payload` (alarm JSON), `subject`, `unmarshaller` |
//! | `{channel}` | Pub/Sub | Receives the `oid` of every new alarm |

use fred::prelude::*;
use meshwatch_core::config::AlarmConfig;
use meshwatch_core::AlarmSink;
use meshwatch_types::AlarmRecord;

use crate::error::DbError;

/// Hash field holding the serialized [`AlarmRecord`].
pub const PAYLOAD_FIELD: &str = "payload";

/// Hash field naming the record's subject.
pub const SUBJECT_FIELD: &str = "subject";

/// Hash field naming the consumer-side unmarshaller.
pub const UNMARSHALLER_FIELD: &str = "unmarshaller";

/// Connection handle to the alarm store.
///
/// Wraps a [`fred::prelude::Client`]. Cloning is cheap and shares the
/// connection.
#[derive(Clone)]
pub struct AlarmStore {
    client: Client,
    channel: String,
    subject: String,
    unmarshaller: String,
}

impl AlarmStore {
    /// Connect to the store named by `config.store_url`.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(config: &AlarmConfig) -> Result<Self, DbError> {
        let fred_config = Config::from_url(&config.store_url)
            .map_err(|e| DbError::Config(format!("Invalid alarm store URL: {e}")))?;

        let client = Builder::from_config(fred_config).build()?;
        client.init().await?;

        tracing::info!(channel = %config.channel, "Connected to alarm store");
        Ok(Self {
            client,
            channel: config.channel.clone(),
            subject: config.subject.clone(),
            unmarshaller: config.unmarshaller.clone(),
        })
    }

    /// Write `record` and announce its `oid` on the alarm channel.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if the record cannot be encoded.
    /// Returns [`DbError::Dragonfly`] if the write or publish fails.
    pub async fn store_alarm(&self, record: &AlarmRecord) -> Result<(), DbError> {
        let fields = hash_fields(record, &self.subject, &self.unmarshaller)?;
        let _: u64 = self.client.hset(record.oid.as_str(), fields).await?;
        let _: u64 = self
            .client
            .publish(self.channel.as_str(), record.oid.as_str())
            .await?;

        tracing::debug!(oid = %record.oid, "Alarm stored and published");
        Ok(())
    }

    /// Read back the record stored under `oid`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::KeyNotFound`] if no alarm has that id.
    /// Returns [`DbError::Serialization`] if the payload is not a record.
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn load_alarm(&self, oid: &str) -> Result<AlarmRecord, DbError> {
        let payload: Option<String> = self.client.hget(oid, PAYLOAD_FIELD).await?;
        payload.map_or_else(
            || Err(DbError::KeyNotFound(oid.to_owned())),
            |s| Ok(serde_json::from_str(&s)?),
        )
    }

    /// Delete the alarm stored under `oid`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete_alarm(&self, oid: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(oid).await?;
        Ok(())
    }

    /// Channel on which new alarm ids are published.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

impl AlarmSink for AlarmStore {
    fn submit(&self, record: AlarmRecord) {
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.store_alarm(&record).await {
                tracing::warn!(oid = %record.oid, error = %e, "Failed to store alarm");
            }
        });
    }
}

/// The hash fields written for `record`.
fn hash_fields(
    record: &AlarmRecord,
    subject: &str,
    unmarshaller: &str,
) -> Result<Vec<(&'static str, String)>, DbError> {
    Ok(vec![
        (PAYLOAD_FIELD, serde_json::to_string(record)?),
        (SUBJECT_FIELD, subject.to_owned()),
        (UNMARSHALLER_FIELD, unmarshaller.to_owned()),
    ])
}
