//! # Error Types
//!
//! Error handling for the sealed datagram protocol.
//!
//! Errors fall into two groups with very different propagation rules:
//!
//! ## Per-datagram errors
//! - [`FrameError`]: structural problems, detected before any cipher work
//! - [`AeadError::AuthenticationFailed`]: forged or corrupted frames
//!
//! These are contained inside the request handler. The sender never sees
//! them; the only observable effect of a rejected datagram is silence.
//!
//! ## Startup errors
//! - [`AeadError::KeyLengthInvalid`]: bad key material
//! - [`ProtocolError::ConfigError`]: invalid configuration
//!
//! These are fatal and abort the process before it starts serving.
//!
//! No variant carries key bytes or plaintext.
//!
//! ## Example Usage
//! ```rust
//! use secure_datagram::core::frame;
//! use secure_datagram::error::{FrameError, ProtocolError, Result};
//!
//! fn nonce_of(datagram: &[u8]) -> Result<[u8; 12]> {
//!     let parts = frame::split(datagram)?;
//!     Ok(parts.nonce)
//! }
//!
//! match nonce_of(b"this should fail") {
//!     Err(ProtocolError::Frame(FrameError::TooShort { len })) => assert_eq!(len, 16),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Static error messages used on log and error paths.
pub mod constants {
    /// Frame validation
    pub const ERR_FRAME_TOO_SHORT: &str = "Datagram shorter than nonce and tag";

    /// Cryptographic errors
    pub const ERR_AUTHENTICATION_FAILED: &str = "Authentication failed";
    pub const ERR_ENCRYPTION_FAILED: &str = "Encryption failed";
    pub const ERR_RANDOMNESS_UNAVAILABLE: &str = "Secure random source unavailable";

    /// Transport errors
    pub const ERR_RECEIVE_FAILED: &str = "Failed to receive datagram";
    pub const ERR_SEND_FAILED: &str = "Failed to send datagram";
    pub const ERR_FORWARD_FAILED: &str = "Failed to forward plaintext";
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_TIMEOUT: &str = "Operation timed out";

    /// Configuration errors
    pub const ERR_INVALID_KEY_HEX: &str = "Key is not valid hexadecimal";
    pub const ERR_LOGGING_INIT: &str = "Failed to initialise logging";
}

/// Structural failures while slicing a datagram into a frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Datagram too short: {len} bytes (minimum 28)")]
    TooShort { len: usize },
}

/// Failures of the AEAD engine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadError {
    /// Tag mismatch. Covers corruption, forgery and the wrong key alike.
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    KeyLengthInvalid { expected: usize, actual: usize },

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Secure random source unavailable")]
    RandomnessUnavailable,
}

// ProtocolError is the primary error type for all crate operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Cryptographic error: {0}")]
    Aead(#[from] AeadError),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// True for errors that must halt the process instead of being
    /// absorbed per datagram.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::ConfigError(_) | ProtocolError::Aead(AeadError::KeyLengthInvalid { .. })
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
