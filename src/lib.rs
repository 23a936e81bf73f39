//! # Secure Datagram
//!
//! Authenticated ChaCha20-Poly1305 datagram protocol core with a UDP relay.
//!
//! Each UDP datagram is a self-contained AEAD message:
//!
//! ```text
//! [Nonce(12)] [Ciphertext(N)] [Tag(16)]
//! ```
//!
//! sealed under a pre-shared 256-bit key. There is no handshake and no
//! session: a listener opens each datagram independently, hands the
//! plaintext to a processor, and seals any reply under a fresh nonce.
//! Malformed or forged datagrams are dropped silently and counted.
//!
//! ## Layers
//! - [`core`]: frame split/join
//! - [`utils`]: AEAD engine, metrics, logging, timeouts
//! - [`protocol`]: per-datagram handler and processors
//! - [`transport`]: socket adapter and receive loop
//! - [`service`]: configured relay and client
//!
//! ## Example
//! ```no_run
//! use secure_datagram::service::{Relay, SecureDatagramClient};
//! use secure_datagram::{RelayConfig, SymmetricKey};
//!
//! # async fn demo() -> secure_datagram::Result<()> {
//! let key_hex = "d38a3b96a26d0b1139bd30c174884f5dbc8eaaf492493725633ecebfa4ab19e9";
//! let config = RelayConfig::default_with_overrides(|c| {
//!     c.server.chacha_key = key_hex.to_string();
//!     c.listeners[0].bind = "127.0.0.1:5171".to_string();
//! });
//!
//! let relay = Relay::from_config(&config)?.bind().await?;
//! tokio::spawn(relay.run_until_ctrl_c());
//!
//! let client = SecureDatagramClient::connect(
//!     "127.0.0.1:5171".parse().unwrap(),
//!     &SymmetricKey::from_hex(key_hex)?,
//! )
//! .await?;
//! let reply = client.request(b"Hello, Server!").await?;
//! assert_eq!(&reply[..], b"Hello, Server!");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::RelayConfig;
pub use error::{AeadError, FrameError, ProtocolError, Result};
pub use utils::crypto::{Crypto, Plaintext, SymmetricKey};
