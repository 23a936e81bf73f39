//! Processing functions applied to authenticated plaintext.
//!
//! A [`Processor`] sees plaintext only after the tag has verified. It
//! returns `Some(reply)` to have the reply sealed and sent back to the
//! peer, or `None` for fire-and-forget messages. Processors never perform
//! blocking I/O; the forwarder uses a non-blocking send.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::{constants, ProtocolError, Result};
use crate::utils::metrics::Metrics;

/// Application hook run once per authenticated datagram.
pub trait Processor: Send + Sync + 'static {
    fn process(&self, plaintext: &[u8], peer: SocketAddr) -> Option<Vec<u8>>;
}

impl<F> Processor for F
where
    F: Fn(&[u8], SocketAddr) -> Option<Vec<u8>> + Send + Sync + 'static,
{
    fn process(&self, plaintext: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        self(plaintext, peer)
    }
}

/// Replies with the plaintext unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoProcessor;

impl Processor for EchoProcessor {
    fn process(&self, plaintext: &[u8], _peer: SocketAddr) -> Option<Vec<u8>> {
        Some(plaintext.to_vec())
    }
}

/// Accepts every message without replying.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardProcessor;

impl Processor for DiscardProcessor {
    fn process(&self, plaintext: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        debug!(%peer, len = plaintext.len(), "Discarding authenticated message");
        None
    }
}

/// Resolve a forward destination, preferring an IPv4 address when the
/// name has both.
pub async fn resolve_destination(address: &str) -> Result<SocketAddr> {
    let resolved: Vec<SocketAddr> = tokio::net::lookup_host(address)
        .await
        .map_err(|e| {
            ProtocolError::ConfigError(format!("Failed to resolve forward address '{address}': {e}"))
        })?
        .collect();

    resolved
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| resolved.first())
        .copied()
        .ok_or_else(|| {
            ProtocolError::ConfigError(format!("Forward address '{address}' resolved to nothing"))
        })
}

/// Sends each plaintext as one datagram to a fixed destination.
///
/// The socket must already be connected to `destination`. Uses
/// `try_send`, so a full socket buffer drops the message instead of
/// waiting.
#[derive(Debug)]
pub struct ForwardProcessor {
    socket: Arc<UdpSocket>,
    destination: SocketAddr,
    metrics: Arc<Metrics>,
}

impl ForwardProcessor {
    pub fn new(socket: Arc<UdpSocket>, destination: SocketAddr, metrics: Arc<Metrics>) -> Self {
        Self {
            socket,
            destination,
            metrics,
        }
    }

    /// Resolve `address` (`host:port`), bind an ephemeral local socket and
    /// connect it to the resolved destination.
    pub async fn connect(address: &str, metrics: Arc<Metrics>) -> Result<Self> {
        let destination = resolve_destination(address).await?;
        let local: SocketAddr = if destination.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(destination).await?;
        Ok(Self::new(Arc::new(socket), destination, metrics))
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl Processor for ForwardProcessor {
    fn process(&self, plaintext: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        match self.socket.try_send(plaintext) {
            Ok(_) => {
                self.metrics.forwarded();
                debug!(
                    "{} -> {} -- forwarded {} bytes",
                    peer.ip(),
                    self.destination,
                    plaintext.len()
                );
            }
            Err(e) => {
                self.metrics.forward_failure();
                warn!(
                    "{} -> {} -- {}: {e}",
                    peer.ip(),
                    self.destination,
                    constants::ERR_FORWARD_FAILED
                );
            }
        }
        None
    }
}
