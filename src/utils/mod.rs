//! # Utility Modules
//!
//! Supporting utilities for cryptography, logging, metrics, and timing.
//!
//! ## Components
//! - **Crypto**: ChaCha20-Poly1305 AEAD engine and key handling
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe datagram counters
//! - **Timeout**: Async timeout wrappers
//!
//! ## Security
//! - Cryptographically secure RNG (getrandom) for every nonce
//! - Memory zeroing for keys and recovered plaintext (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use crypto::{Crypto, Plaintext, SymmetricKey};
pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
