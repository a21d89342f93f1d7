//! TCP stream transport.
//!
//! Maintains the single bidirectional connection to the control server.
//! Inbound frames are read off the socket, decoded and published through
//! the dispatcher; outbound commands are encoded and written back on the
//! same socket. The read loop runs on its own task and is torn down
//! through a watch channel on disconnect.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatch::SessionDispatcher;
use crate::error::{Result, TransportError};
use codec::{decode_header, decode_payload, Command, FRAME_HEADER_LEN};
use types::ConnectionStatus;

/// TCP stream transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Control server host.
    pub host: String,
    /// Control server stream port.
    pub port: u16,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Initial capacity of the reusable block read buffer.
    pub read_buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 19083,
            connect_timeout: Duration::from_secs(5),
            read_buffer_size: 64 * 1024,
        }
    }
}

impl StreamConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Client side of the control-server stream connection.
pub struct StreamAdapter {
    config: StreamConfig,
    dispatcher: Arc<SessionDispatcher>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
    shutdown: Option<watch::Sender<bool>>,
    read_task: Option<JoinHandle<()>>,
}

impl StreamAdapter {
    pub fn new(config: StreamConfig, dispatcher: Arc<SessionDispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            writer: Arc::new(Mutex::new(None)),
            shutdown: None,
            read_task: None,
        }
    }

    pub fn dispatcher(&self) -> &Arc<SessionDispatcher> {
        &self.dispatcher
    }

    pub fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    /// Point the adapter at a different server. Any live connection is torn
    /// down first; the caller reconnects explicitly.
    pub async fn update_endpoint(&mut self, host: String, port: u16) {
        self.disconnect().await;
        self.config.host = host;
        self.config.port = port;
    }

    /// Connect to the control server and start the frame read loop.
    ///
    /// An existing connection is torn down first, so repeated calls
    /// reconnect rather than leak tasks.
    pub async fn connect(&mut self) -> Result<()> {
        self.disconnect().await;

        let endpoint = self.config.endpoint();
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(&endpoint),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            operation: "stream connect",
            timeout_ms: self.config.connect_timeout.as_millis() as u64,
        })?
        .map_err(|e| TransportError::ConnectionFailed {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to disable Nagle on stream socket");
        }

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);

        info!(endpoint = %endpoint, "connected to control server");
        self.dispatcher.publish_status(ConnectionStatus::Connected {
            endpoint: endpoint.clone(),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown = Some(shutdown_tx);
        self.read_task = Some(tokio::spawn(read_loop(
            BufReader::new(read_half),
            shutdown_rx,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.writer),
            self.config.read_buffer_size,
        )));
        Ok(())
    }

    /// Encode and write one command frame. Fails without buffering when the
    /// connection is down.
    pub async fn send(&self, command: &Command) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let frame = command.encode();
        writer.write_all(&frame).await?;
        writer.flush().await?;
        debug!(
            tag = %(command.tag() as char),
            bytes = frame.len(),
            "sent command frame"
        );
        Ok(())
    }

    /// Tear down the connection. Safe to call when already disconnected.
    pub async fn disconnect(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.read_task.take() {
            let _ = task.await;
        }
        *self.writer.lock().await = None;
    }

    pub async fn is_connected(&self) -> bool {
        self.writer.lock().await.is_some()
    }
}

/// Socket read loop: frames in, payloads out through the dispatcher.
///
/// Exits on shutdown signal or the first unrecoverable socket error, then
/// drops the write half and publishes a disconnect status.
async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    mut shutdown: watch::Receiver<bool>,
    dispatcher: Arc<SessionDispatcher>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
    buffer_size: usize,
) {
    let mut block_buf = BytesMut::with_capacity(buffer_size);
    let reason = loop {
        tokio::select! {
            _ = shutdown.changed() => break "shutdown requested".to_string(),
            result = read_frame(&mut reader, &dispatcher, &mut block_buf) => {
                match result {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        break "server closed the connection".to_string();
                    }
                    Err(e) => break format!("stream read failed: {e}"),
                }
            }
        }
    };

    info!(reason = %reason, "stream read loop stopped");
    *writer.lock().await = None;
    dispatcher.publish_status(ConnectionStatus::Disconnected { reason });
}

/// Read and dispatch one frame.
///
/// Block-local decode failures are logged and skipped; only the framing
/// itself (header and length prefixes) can fail this function, because a
/// corrupt length leaves no way to resynchronize the stream.
async fn read_frame(
    reader: &mut BufReader<OwnedReadHalf>,
    dispatcher: &SessionDispatcher,
    block_buf: &mut BytesMut,
) -> std::io::Result<()> {
    let mut header_buf = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header_buf).await?;
    let header = decode_header(&header_buf)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if header.is_heartbeat() {
        debug!(session = %header.session, "heartbeat");
        return Ok(());
    }

    for _ in 0..header.block_count {
        let mut len_buf = [0u8; 2];
        reader.read_exact(&mut len_buf).await?;
        let length = u16::from_le_bytes(len_buf) as usize;
        if length == 0 {
            continue;
        }

        block_buf.resize(length, 0);
        reader.read_exact(&mut block_buf[..]).await?;

        match decode_payload(&block_buf[..]) {
            Ok(payload) => dispatcher.publish(payload),
            Err(e) => warn!(
                session = %header.session,
                sequence = header.sequence,
                error = %e,
                "skipping malformed block"
            ),
        }
    }
    Ok(())
}
