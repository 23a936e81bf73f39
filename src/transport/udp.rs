//! UDP transport adapter and receive loop.
//!
//! The protocol core only needs two capabilities from a transport: receive
//! one datagram with its source address, and send one datagram to an
//! address. [`DatagramTransport`] captures exactly that, implemented here
//! for `tokio::net::UdpSocket`.
//!
//! [`serve`] owns the loop: each datagram is copied out of the receive
//! buffer and handled on its own task, bounded by a semaphore. A datagram
//! that fails in any way affects only itself.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::core::frame::MAX_DATAGRAM_LEN;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::handler::{Outcome, RequestHandler};
use crate::protocol::processor::Processor;
use crate::utils::timeout;

/// Datagram send/receive capability consumed by the receive loop.
pub trait DatagramTransport: Send + Sync + 'static {
    /// Receive one datagram into `buf`, returning its length and source.
    fn recv_datagram(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Send one datagram to `peer`.
    fn send_datagram(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;
}

impl DatagramTransport for UdpSocket {
    async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf).await
    }

    async fn send_datagram(&self, datagram: &[u8], peer: SocketAddr) -> io::Result<usize> {
        self.send_to(datagram, peer).await
    }
}

/// First pause after a failed receive; doubles per consecutive failure.
pub const RECEIVE_BACKOFF_MIN: Duration = Duration::from_millis(1);

/// Longest pause between receive attempts on a failing socket.
pub const RECEIVE_BACKOFF_MAX: Duration = Duration::from_millis(100);

/// While failures continue, warn once per this many.
const RECEIVE_WARN_EVERY: u32 = 100;

fn receive_backoff(consecutive_errors: u32) -> Duration {
    let doublings = consecutive_errors.saturating_sub(1).min(16);
    RECEIVE_BACKOFF_MIN
        .saturating_mul(1 << doublings)
        .min(RECEIVE_BACKOFF_MAX)
}

/// Receive loop limits.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Receive buffer size
    pub max_datagram_size: usize,
    /// Maximum datagrams being handled at once
    pub max_in_flight: usize,
    /// How long to wait for in-flight datagrams after cancellation
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            max_datagram_size: MAX_DATAGRAM_LEN,
            max_in_flight: crate::config::DEFAULT_MAX_IN_FLIGHT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl From<&ServerConfig> for ServeOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_datagram_size: config.max_datagram_size,
            max_in_flight: config.max_in_flight,
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

/// Bind a UDP socket for a listener.
#[instrument]
pub async fn bind(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(addr).await?;
    info!(local = %socket.local_addr()?, "Listening on UDP");
    Ok(socket)
}

/// Run the receive loop until `shutdown` is cancelled.
///
/// Receive errors are counted and the loop keeps serving, pausing between
/// attempts while the socket keeps failing.
#[instrument(skip_all, name = "serve")]
pub async fn serve<T, P>(
    transport: Arc<T>,
    handler: Arc<RequestHandler<P>>,
    options: ServeOptions,
    shutdown: CancellationToken,
) -> Result<()>
where
    T: DatagramTransport,
    P: Processor,
{
    if options.max_in_flight == 0 {
        return Err(ProtocolError::ConfigError(
            "Max in-flight datagrams must be greater than 0".to_string(),
        ));
    }
    let drain_permits = u32::try_from(options.max_in_flight)
        .ok()
        .filter(|_| options.max_in_flight <= Semaphore::MAX_PERMITS)
        .ok_or_else(|| {
            ProtocolError::ConfigError(format!(
                "Max in-flight datagrams too large: {}",
                options.max_in_flight
            ))
        })?;

    let permits = Arc::new(Semaphore::new(options.max_in_flight));
    let mut buf = vec![0u8; options.max_datagram_size];
    let mut consecutive_errors: u32 = 0;

    loop {
        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            permit = permits.clone().acquire_owned() => permit.map_err(|_| {
                ProtocolError::TransportError("Datagram permit pool closed".to_string())
            })?,
        };

        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = transport.recv_datagram(&mut buf) => received,
        };

        let (len, peer) = match received {
            Ok(received) => received,
            Err(e) => {
                handler.metrics().receive_error();
                consecutive_errors = consecutive_errors.saturating_add(1);
                if consecutive_errors == 1 || consecutive_errors % RECEIVE_WARN_EVERY == 0 {
                    warn!(error = %e, consecutive = consecutive_errors, "{}", constants::ERR_RECEIVE_FAILED);
                } else {
                    debug!(error = %e, consecutive = consecutive_errors, "{}", constants::ERR_RECEIVE_FAILED);
                }

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(receive_backoff(consecutive_errors)) => {}
                }
                continue;
            }
        };
        if consecutive_errors > 0 {
            debug!(failed = consecutive_errors, "Receive recovered");
            consecutive_errors = 0;
        }

        let datagram = Bytes::copy_from_slice(&buf[..len]);
        let transport = transport.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let _permit = permit;
            respond(transport.as_ref(), handler.as_ref(), &datagram, peer).await;
        });
    }

    info!("Shutting down listener. Waiting for in-flight datagrams...");
    let drained = tokio::time::timeout(
        options.shutdown_timeout,
        permits.acquire_many(drain_permits),
    )
    .await;
    match drained {
        Ok(_) => info!("All in-flight datagrams handled"),
        Err(_) => warn!("Shutdown timeout reached, abandoning in-flight datagrams"),
    }

    Ok(())
}

/// Handle one datagram and send the reply, if any, back to its source.
pub async fn respond<T, P>(
    transport: &T,
    handler: &RequestHandler<P>,
    datagram: &[u8],
    peer: SocketAddr,
) where
    T: DatagramTransport,
    P: Processor,
{
    let Outcome::Replied(reply) = handler.handle(datagram, peer) else {
        return;
    };

    match transport.send_datagram(&reply, peer).await {
        Ok(sent) => debug!(%peer, sent, "Reply sent"),
        Err(e) => {
            handler.metrics().send_failure();
            warn!(%peer, error = %e, "{}", constants::ERR_SEND_FAILED);
        }
    }
}
