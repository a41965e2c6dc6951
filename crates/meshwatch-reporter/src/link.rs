//! Link from the reporter to the anchor.
//!
//! Device lines are read on their own task into a channel. The link task
//! connects to the anchor, forwards each line as a `raw` record, and
//! writes inbound console commands to the output. When the anchor is
//! unreachable the link retries after a fixed delay, and lines read in
//! the meantime are dropped.

use std::path::Path;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use meshwatch_core::FrameCodec;
use meshwatch_core::codec::encode_json;
use meshwatch_types::{RawRecord, ReporterCommand};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::config::ReporterConfig;
use crate::error::ReporterError;

/// Largest command frame accepted from the anchor.
const MAX_COMMAND_BYTES: usize = 64 * 1024;

/// Lines buffered between the device reader and the link.
const LINE_BUFFER: usize = 256;

/// Why a session with the anchor ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The anchor closed the link or the link failed.
    Lost,
    /// The device input ended.
    InputClosed,
}

/// Open the configured device, or stdin, as a line source.
pub async fn open_device(device: Option<&Path>) -> Result<mpsc::Receiver<String>, ReporterError> {
    match device {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            info!(device = %path.display(), "Reading telemetry from device");
            Ok(spawn_line_reader(file))
        }
        None => {
            info!("Reading telemetry from stdin");
            Ok(spawn_line_reader(tokio::io::stdin()))
        }
    }
}

/// Read non-empty lines from `input` on a background task.
///
/// The returned channel closes when the input ends or fails.
pub fn spawn_line_reader<R>(input: R) -> mpsc::Receiver<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    tokio::spawn(async move {
        let mut lines = BufReader::new(input).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Device input ended");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Device read failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Keep a link to the anchor up until the device input ends.
pub async fn run<W>(
    config: &ReporterConfig,
    mut lines: mpsc::Receiver<String>,
    output: &mut W,
) -> Result<(), ReporterError>
where
    W: AsyncWrite + Unpin,
{
    let addr = config.anchor_addr();
    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "Failed to set TCP_NODELAY");
                }
                info!(anchor = %addr, "Connected to anchor");
                match session(stream, &mut lines, output).await? {
                    SessionEnd::InputClosed => return Ok(()),
                    SessionEnd::Lost => warn!(anchor = %addr, "Lost connection to anchor"),
                }
            }
            Err(e) => warn!(anchor = %addr, error = %e, "Failed to connect to anchor"),
        }

        if !wait_dropping(&mut lines, config.reconnect_delay).await {
            return Ok(());
        }
    }
}

/// Exchange frames with the anchor over `stream` until either side ends.
///
/// Each line becomes a `raw` record stamped with the current time in
/// milliseconds. Each inbound command's data is written to `output`
/// followed by a newline.
pub async fn session<S, W>(
    stream: S,
    lines: &mut mpsc::Receiver<String>,
    output: &mut W,
) -> Result<SessionEnd, ReporterError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, FrameCodec::new(MAX_COMMAND_BYTES));

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    return Ok(SessionEnd::InputClosed);
                };
                let record = RawRecord {
                    data: line,
                    time: Some(chrono::Utc::now().timestamp_millis()),
                };
                if let Err(e) = framed.send(encode_json(&record)?).await {
                    debug!(error = %e, "Failed to send record");
                    return Ok(SessionEnd::Lost);
                }
            }
            frame = framed.next() => match frame {
                Some(Ok(body)) => match serde_json::from_slice::<ReporterCommand>(&body) {
                    Ok(command) => {
                        output.write_all(command.data.as_bytes()).await?;
                        output.write_all(b"\n").await?;
                        output.flush().await?;
                    }
                    Err(e) => warn!(error = %e, "Dropping malformed command"),
                },
                Some(Err(e)) => {
                    warn!(error = %e, "Anchor link failed");
                    return Ok(SessionEnd::Lost);
                }
                None => return Ok(SessionEnd::Lost),
            },
        }
    }
}

/// Discard lines for `delay`. Returns `false` if the input ended.
async fn wait_dropping(lines: &mut mpsc::Receiver<String>, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    let mut dropped: u64 = 0;

    let open = loop {
        tokio::select! {
            () = &mut sleep => break true,
            line = lines.recv() => {
                if line.is_none() {
                    break false;
                }
                dropped = dropped.saturating_add(1);
            }
        }
    };

    if dropped > 0 {
        debug!(dropped, "Dropped lines while disconnected");
    }
    open
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_lines_are_skipped() {
        let input: &[u8] = b"r: ID sn1 selected rank 256\n\n   \r\nstation: west\n";
        let mut rx = spawn_line_reader(input);

        assert_eq!(rx.recv().await.unwrap(), "r: ID sn1 selected rank 256");
        assert_eq!(rx.recv().await.unwrap(), "station: west");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn session_sends_raw_records_and_prints_commands() {
        let (client, server) = tokio::io::duplex(4096);
        let (tx, mut lines) = mpsc::channel(4);
        let mut output = Vec::new();

        let anchor = tokio::spawn(async move {
            let mut framed = Framed::new(server, FrameCodec::new(MAX_COMMAND_BYTES));
            let body = framed.next().await.unwrap().unwrap();
            let record: RawRecord = serde_json::from_slice(&body).unwrap();
            let command = ReporterCommand {
                data: "reboot".to_owned(),
            };
            framed.send(encode_json(&command).unwrap()).await.unwrap();
            record
        });

        tx.send("p_s: ID sn4 selected ID sn7 as parent".to_owned())
            .await
            .unwrap();
        let (end, record) = tokio::join!(session(client, &mut lines, &mut output), anchor);

        let record = record.unwrap();
        assert_eq!(record.data, "p_s: ID sn4 selected ID sn7 as parent");
        assert!(record.time.is_some());
        assert_eq!(end.unwrap(), SessionEnd::Lost);
        assert_eq!(output, b"reboot\n");
    }

    #[tokio::test]
    async fn session_ends_when_input_closes() {
        let (client, _server) = tokio::io::duplex(1024);
        let (tx, mut lines) = mpsc::channel::<String>(1);
        drop(tx);

        let end = session(client, &mut lines, &mut Vec::new()).await.unwrap();
        assert_eq!(end, SessionEnd::InputClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn lines_are_dropped_while_waiting() {
        let (tx, mut lines) = mpsc::channel(4);
        tx.send("lost".to_owned()).await.unwrap();

        assert!(wait_dropping(&mut lines, Duration::from_millis(500)).await);
        assert!(lines.try_recv().is_err());

        drop(tx);
        assert!(!wait_dropping(&mut lines, Duration::from_millis(500)).await);
    }
}
