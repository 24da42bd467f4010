//! # Remote Link Module
//!
//! Handles the message channel to the turret host.
//!
//! This module handles:
//! - Connecting to the turret over TCP
//! - Writing outbound messages as JSON lines
//! - Reading and decoding inbound reports
//! - Fire-and-forget sending from a background writer task

pub mod decoder;
pub mod protocol;

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ConsoleError, Result};
use decoder::{decode_line, Report};
use protocol::Outbound;

/// Outbound half of a turret connection
#[async_trait]
pub trait RemoteLink: Send {
    /// Send a single message
    async fn send(&mut self, message: &Outbound) -> Result<()>;
}

/// Encode an outbound message as a newline-terminated JSON line
///
/// # Errors
///
/// Returns error if the message cannot be serialized
pub fn encode_line(message: &Outbound) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    Ok(line)
}

/// Writer half of a TCP connection to the turret
pub struct TcpLink {
    writer: OwnedWriteHalf,
    address: String,
}

impl std::fmt::Debug for TcpLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpLink")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl TcpLink {
    /// Connect to the turret host
    ///
    /// # Returns
    ///
    /// * `Result<(TcpLink, ReportReader)>` - Writer and reader halves
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails or times out
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use turret_console::remote::TcpLink;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let (link, reader) = TcpLink::connect("127.0.0.1:5001", Duration::from_millis(100)).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(address: &str, timeout: Duration) -> Result<(Self, ReportReader)> {
        debug!("Connecting to turret at {}", address);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| ConsoleError::Link(format!("Timed out connecting to {}", address)))?
            .map_err(|e| ConsoleError::Link(format!("Failed to connect to {}: {}", address, e)))?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to disable Nagle on {}: {}", address, e);
        }

        info!("Connected to turret at {}", address);

        let (read_half, write_half) = stream.into_split();
        Ok((
            Self {
                writer: write_half,
                address: address.to_string(),
            },
            ReportReader::new(read_half),
        ))
    }

    /// Address this link is connected to
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl RemoteLink for TcpLink {
    async fn send(&mut self, message: &Outbound) -> Result<()> {
        let line = encode_line(message)?;

        self.writer
            .write_all(&line)
            .await
            .map_err(|e| ConsoleError::Link(format!("Failed to write {}: {}", message.event_name(), e)))?;

        self.writer
            .flush()
            .await
            .map_err(|e| ConsoleError::Link(format!("Failed to flush link: {}", e)))?;

        debug!("Sent {} ({} bytes)", message.event_name(), line.len());
        Ok(())
    }
}

/// Longest inbound line accepted, in bytes. Longer lines are skipped.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Reader half of a turret connection
pub struct ReportReader {
    reader: BufReader<OwnedReadHalf>,
    buf: Vec<u8>,
}

impl ReportReader {
    fn new(read_half: OwnedReadHalf) -> Self {
        Self {
            reader: BufReader::new(read_half),
            buf: Vec::new(),
        }
    }

    /// Read the next decodable report
    ///
    /// Malformed lines (bad UTF-8, bad JSON, oversized) are logged and
    /// skipped. Returns `Ok(None)` when the turret closes the connection.
    ///
    /// # Errors
    ///
    /// Returns error on socket read failure
    pub async fn next_report(&mut self) -> Result<Option<Report>> {
        loop {
            if !self.read_line().await? {
                return Ok(None);
            }

            if self.buf.len() > MAX_LINE_BYTES && !self.buf.ends_with(b"\n") {
                warn!("Dropping report longer than {} bytes", MAX_LINE_BYTES);
                if !self.skip_line().await? {
                    return Ok(None);
                }
                continue;
            }

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Dropping non UTF-8 report: {}", e);
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(line) {
                Ok(report) => return Ok(Some(report)),
                Err(e) => warn!("Dropping malformed report: {}", e),
            }
        }
    }

    /// Read up to one byte past the limit into `buf`. `false` at end of stream.
    async fn read_line(&mut self) -> Result<bool> {
        self.buf.clear();
        let limit = (MAX_LINE_BYTES + 1) as u64;
        let n = (&mut self.reader).take(limit).read_until(b'\n', &mut self.buf).await?;
        Ok(n > 0)
    }

    /// Discard the remainder of an oversized line. `false` at end of stream.
    async fn skip_line(&mut self) -> Result<bool> {
        while !self.buf.ends_with(b"\n") {
            if !self.read_line().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Spawn the background writer
///
/// Messages queued on the returned sender are written in order. A failed send
/// is logged and the message dropped; the next message is still attempted.
/// The task ends when every sender is dropped.
pub fn spawn_writer<L>(mut link: L) -> (mpsc::UnboundedSender<Outbound>, JoinHandle<()>)
where
    L: RemoteLink + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let handle = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = link.send(&message).await {
                warn!("Failed to send {}: {}", message.event_name(), e);
            }
        }
        debug!("Writer task finished");
    });

    (tx, handle)
}

/// Spawn the background reader
///
/// Forwards a [`Report::Link`]`(true)` first, then every decoded report, and a
/// final [`Report::Link`]`(false)` when the connection closes or fails.
pub fn spawn_reader(mut reader: ReportReader) -> (mpsc::UnboundedReceiver<Report>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel::<Report>();

    let handle = tokio::spawn(async move {
        if tx.send(Report::Link(true)).is_err() {
            return;
        }
        loop {
            match reader.next_report().await {
                Ok(Some(report)) => {
                    if tx.send(report).is_err() {
                        return;
                    }
                }
                Ok(None) => {
                    info!("Turret closed the connection");
                    break;
                }
                Err(e) => {
                    warn!("Link read failed: {}", e);
                    break;
                }
            }
        }
        let _ = tx.send(Report::Link(false));
    });

    (rx, handle)
}
