//! Reporter connection manager.
//!
//! Accepts reporter links, registers each one with the [`Hub`], decodes
//! every inbound frame, and writes routed console commands back out. A
//! link's lifetime is Connecting, then Online until the transport closes or
//! fails, then Closed, at which point its registration is released.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use meshwatch_types::{
    DecodedEvent, RAW_RECORD_TYPE, RawRecord, ReporterCommand, ReporterId, UpdatePayload,
    ViewerMessage,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::alerts::AlertForwarder;
use crate::codec::{FrameCodec, FrameError, encode_json};
use crate::config::HubSettings;
use crate::decoder;
use crate::hub::Hub;

/// Errors from the reporter listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind the reporter port.
    #[error("failed to bind reporter listener to {addr}: {source}")]
    Bind {
        /// The address that failed.
        addr: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Bind the reporter listener.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })
}

/// Serves reporter links against one hub.
#[derive(Debug, Clone)]
pub struct ReporterService {
    hub: Arc<Hub>,
    alerts: Arc<AlertForwarder>,
    command_buffer: usize,
    max_frame_bytes: usize,
}

impl ReporterService {
    /// Create a service.
    pub fn new(hub: Arc<Hub>, alerts: Arc<AlertForwarder>, settings: &HubSettings) -> Self {
        Self {
            hub,
            alerts,
            command_buffer: settings.reporter_command_buffer.max(1),
            max_frame_bytes: settings.max_frame_bytes,
        }
    }

    /// Accept reporter links until `shutdown` fires.
    ///
    /// Each link runs on its own task. Accept errors are logged and the
    /// loop continues.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "Reporter listener accepting connections");
        }

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Reporter listener shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, origin)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(%origin, error = %e, "Failed to set TCP_NODELAY");
                        }
                        let service = self.clone();
                        let link_shutdown = shutdown.child_token();
                        tokio::spawn(async move {
                            service.handle_link(stream, origin, link_shutdown).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "Failed to accept reporter connection"),
                },
            }
        }
    }

    /// Drive one reporter link to completion.
    ///
    /// Registers the reporter, then reads frames and writes queued commands
    /// until the transport closes, a framing error occurs, the registration
    /// is taken over by a newer link, or `shutdown` fires. The registration
    /// is released on every exit path.
    pub async fn handle_link<S>(&self, stream: S, origin: SocketAddr, shutdown: CancellationToken)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (tx, mut commands) = mpsc::channel::<ReporterCommand>(self.command_buffer);
        let lease = self.hub.connect_reporter(origin, tx).await;
        info!(reporter = %lease.id, "Reporter connected");

        let framed = Framed::new(stream, FrameCodec::new(self.max_frame_bytes));
        let (mut writer, mut reader) = framed.split();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                frame = reader.next() => match frame {
                    Some(Ok(body)) => self.ingest(&lease.id, &body).await,
                    Some(Err(e)) => {
                        warn!(reporter = %lease.id, error = %e, "Reporter link failed");
                        break;
                    }
                    None => break,
                },
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!(reporter = %lease.id, "Registration replaced, closing link");
                        break;
                    };
                    if let Err(e) = send_command(&mut writer, &command).await {
                        warn!(reporter = %lease.id, error = %e, "Failed to write command");
                        break;
                    }
                }
            }
        }

        if self.hub.release_reporter(&lease).await {
            info!(reporter = %lease.id, "Reporter disconnected");
        }
    }

    /// Handle one inbound frame body from `reporter`.
    ///
    /// Raw records are decoded; any other JSON object is passed to viewers
    /// verbatim as an `update`. Bodies that are not JSON objects are logged
    /// and dropped.
    pub async fn ingest(&self, reporter: &ReporterId, body: &[u8]) {
        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                warn!(reporter = %reporter, error = %e, "Dropping malformed reporter frame");
                return;
            }
        };
        if !value.is_object() {
            warn!(reporter = %reporter, "Dropping reporter frame that is not a JSON object");
            return;
        }

        if value.get("type").and_then(serde_json::Value::as_str) == Some(RAW_RECORD_TYPE) {
            match serde_json::from_value::<RawRecord>(value) {
                Ok(record) => self.ingest_raw(reporter, record).await,
                Err(e) => warn!(reporter = %reporter, error = %e, "Dropping malformed raw record"),
            }
        } else {
            self.hub
                .publish(ViewerMessage::Update(UpdatePayload::Record(value)))
                .await;
        }
    }

    /// Handle one raw telemetry line.
    ///
    /// The line is echoed to viewers as console output, then decoded. A
    /// missing timestamp is taken from the hub clock.
    pub async fn ingest_raw(&self, reporter: &ReporterId, record: RawRecord) {
        let time = record
            .time
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        let line = record.data.trim_end_matches(['\r', '\n']);

        self.hub
            .apply(DecodedEvent::Raw {
                reporter: reporter.clone(),
                text: line.to_owned(),
                time,
            })
            .await;

        let Some(directive) = decoder::decode(line) else {
            trace!(reporter = %reporter, line, "Unrecognised telemetry line");
            return;
        };

        match directive.into_event(reporter, time, |class, node| self.alerts.raise(class, node)) {
            DecodedEvent::Alarm(alarm) => {
                self.alerts.forward(&self.hub, &alarm).await;
            }
            event => {
                self.hub.apply(event).await;
            }
        }
    }
}

async fn send_command<W>(writer: &mut W, command: &ReporterCommand) -> Result<(), FrameError>
where
    W: futures::Sink<Bytes, Error = FrameError> + Unpin,
{
    writer.send(encode_json(command)?).await
}
