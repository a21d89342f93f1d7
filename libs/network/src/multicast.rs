//! UDP multicast transport.
//!
//! Receive-only mirror of the server's broadcast feed. Every datagram is
//! one complete session frame; there is no cross-datagram reassembly, so
//! a corrupt datagram costs at most itself.
//!
//! The socket binds with `SO_REUSEADDR` so several monitors on the same
//! host can join the group side by side.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatch::SessionDispatcher;
use crate::error::{Result, TransportError};
use codec::{decode_header, BlockReader, FRAME_HEADER_LEN};

/// UDP multicast transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticastConfig {
    /// Multicast group address.
    pub group: Ipv4Addr,
    /// Group port.
    pub port: u16,
    /// Local interface to join on.
    pub interface: Ipv4Addr,
    /// Receive buffer size; datagrams larger than this are truncated by
    /// the kernel and will fail frame decoding.
    pub buffer_size: usize,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            group: Ipv4Addr::new(239, 0, 0, 1),
            port: 19084,
            interface: Ipv4Addr::UNSPECIFIED,
            buffer_size: 64 * 1024,
        }
    }
}

/// Receive-only subscriber to the multicast broadcast feed.
pub struct MulticastAdapter {
    config: MulticastConfig,
    dispatcher: Arc<SessionDispatcher>,
    shutdown: Option<watch::Sender<bool>>,
    recv_task: Option<JoinHandle<()>>,
}

impl MulticastAdapter {
    pub fn new(config: MulticastConfig, dispatcher: Arc<SessionDispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            shutdown: None,
            recv_task: None,
        }
    }

    pub fn dispatcher(&self) -> &Arc<SessionDispatcher> {
        &self.dispatcher
    }

    /// Retarget the subscription. A running receive loop is stopped first;
    /// the caller restarts explicitly.
    pub async fn update_group(&mut self, group: Ipv4Addr, port: u16) {
        self.stop().await;
        self.config.group = group;
        self.config.port = port;
    }

    /// Join the group and start the datagram receive loop. A no-op while
    /// already running.
    pub async fn start(&mut self) -> Result<()> {
        if self.recv_task.is_some() {
            return Ok(());
        }

        let socket = self.bind_socket()?;
        socket
            .join_multicast_v4(self.config.group, self.config.interface)
            .map_err(|e| TransportError::Multicast {
                group: self.config.group,
                port: self.config.port,
                source: e,
            })?;
        info!(
            group = %self.config.group,
            port = self.config.port,
            "joined multicast group"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown = Some(shutdown_tx);
        self.recv_task = Some(tokio::spawn(recv_loop(
            socket,
            shutdown_rx,
            Arc::clone(&self.dispatcher),
            self.config.clone(),
        )));
        Ok(())
    }

    /// Leave the group and stop the receive loop. Safe when not running.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.recv_task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.recv_task.is_some()
    }

    /// `SO_REUSEADDR` before bind, so multiple subscribers on this host can
    /// share the group port. Goes through socket2 because tokio's built-in
    /// bind offers no hook between socket creation and bind.
    fn bind_socket(&self) -> Result<UdpSocket> {
        let mc_err = |e: std::io::Error| TransportError::Multicast {
            group: self.config.group,
            port: self.config.port,
            source: e,
        };

        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(mc_err)?;
        socket.set_reuse_address(true).map_err(mc_err)?;
        socket.set_nonblocking(true).map_err(mc_err)?;
        socket
            .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.config.port).into())
            .map_err(mc_err)?;

        UdpSocket::from_std(socket.into()).map_err(mc_err)
    }
}

/// Datagram receive loop. One datagram, one frame; decode failures are
/// logged and the loop moves on to the next datagram.
async fn recv_loop(
    socket: UdpSocket,
    mut shutdown: watch::Receiver<bool>,
    dispatcher: Arc<SessionDispatcher>,
    config: MulticastConfig,
) {
    let mut buf = vec![0u8; config.buffer_size];
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, peer)) => process_datagram(&buf[..len], peer, &dispatcher),
                    Err(e) => {
                        warn!(error = %e, "multicast receive failed");
                    }
                }
            }
        }
    }

    if let Err(e) = socket.leave_multicast_v4(config.group, config.interface) {
        warn!(group = %config.group, error = %e, "failed to leave multicast group");
    }
    info!(group = %config.group, "multicast receive loop stopped");
}

fn process_datagram(datagram: &[u8], peer: std::net::SocketAddr, dispatcher: &SessionDispatcher) {
    let header = match decode_header(datagram) {
        Ok(header) => header,
        Err(e) => {
            warn!(peer = %peer, bytes = datagram.len(), error = %e, "dropping undecodable datagram");
            return;
        }
    };
    if header.is_heartbeat() {
        debug!(session = %header.session, "multicast heartbeat");
        return;
    }

    for block in BlockReader::new(&datagram[FRAME_HEADER_LEN..], header.block_count) {
        let block = match block {
            Ok(block) => block,
            Err(e) => {
                // Remaining blocks are unrecoverable; ones already
                // dispatched stand.
                warn!(
                    session = %header.session,
                    sequence = header.sequence,
                    error = %e,
                    "truncated datagram frame"
                );
                break;
            }
        };
        match codec::decode_payload(block) {
            Ok(payload) => dispatcher.publish(payload),
            Err(e) => warn!(
                session = %header.session,
                sequence = header.sequence,
                error = %e,
                "skipping malformed block"
            ),
        }
    }
}
