use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, instrument};

use crate::core::frame::MAX_DATAGRAM_LEN;
use crate::error::{ProtocolError, Result};
use crate::utils::crypto::{Crypto, Plaintext, SymmetricKey};
use crate::utils::timeout::{with_timeout_error, DEFAULT_RESPONSE_TIMEOUT};

/// Client side of the sealed datagram protocol.
///
/// Every outbound message is sealed under a fresh random nonce. Replies
/// are opened with the same key; a reply that fails authentication is an
/// error, never partial plaintext.
pub struct SecureDatagramClient {
    socket: UdpSocket,
    crypto: Crypto,
    server: SocketAddr,
    response_timeout: Duration,
}

impl SecureDatagramClient {
    /// Bind an ephemeral local socket and connect it to `server`.
    #[instrument(skip(key))]
    pub async fn connect(server: SocketAddr, key: &SymmetricKey) -> Result<Self> {
        let local: SocketAddr = if server.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(server).await?;
        debug!(local = %socket.local_addr()?, "Client socket ready");

        Ok(Self {
            socket,
            crypto: Crypto::new(key),
            server,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        })
    }

    /// Set how long `recv` waits for a reply
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Seal `plaintext` and send it as one frame.
    pub async fn send(&self, plaintext: &[u8]) -> Result<()> {
        let frame = self.crypto.seal_frame(plaintext)?;
        self.send_raw(&frame).await
    }

    /// Send bytes exactly as given, framed or not.
    pub async fn send_raw(&self, datagram: &[u8]) -> Result<()> {
        let sent = self.socket.send(datagram).await?;
        if sent != datagram.len() {
            return Err(ProtocolError::TransportError(format!(
                "Short send: {sent} of {} bytes",
                datagram.len()
            )));
        }
        Ok(())
    }

    /// Wait for one reply frame and open it.
    pub async fn recv(&self) -> Result<Plaintext> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        let len = with_timeout_error(
            async { Ok(self.socket.recv(&mut buf).await?) },
            self.response_timeout,
        )
        .await?;
        self.crypto.open_frame(&buf[..len])
    }

    /// Send a sealed message and wait for the sealed reply.
    pub async fn request(&self, plaintext: &[u8]) -> Result<Plaintext> {
        self.send(plaintext).await?;
        self.recv().await
    }
}
