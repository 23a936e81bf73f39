//! # Request Handler
//!
//! Runs one inbound datagram through the protocol state machine:
//!
//! ```text
//! Received -> Framed -> Verified -> Processed -> Replied
//!     |          |                      |
//!     +----------+----------------------+------> Dropped
//! ```
//!
//! Every failure is absorbed here and reported as [`Outcome::Dropped`].
//! Nothing propagates to the receive loop, and a rejected datagram gets no
//! reply, so a forged frame looks the same to its sender as a lost one.
//!
//! The handler keeps no per-datagram state. The key is the only thing
//! shared between invocations, and it is read-only.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::core::frame;
use crate::error::{constants, AeadError};
use crate::protocol::processor::Processor;
use crate::utils::crypto::{Crypto, Plaintext};
use crate::utils::metrics::{Metrics, Timer};

/// Stages a datagram moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Framed,
    Verified,
    Processed,
    Replied,
    Dropped,
}

/// Why a datagram failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Shorter than nonce plus tag; no cipher work was done
    TooShort,
    /// Tag did not verify under the configured key
    AuthenticationFailed,
}

/// Result of framing and verifying a datagram. A rejection carries no
/// decrypted bytes.
#[derive(Debug, PartialEq, Eq)]
pub enum VerificationResult {
    Authenticated(Plaintext),
    Rejected(RejectReason),
}

/// Why a datagram produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Rejected(RejectReason),
    /// Processor accepted the message and returned nothing
    NoResponse,
    /// Reply could not be sealed (RNG or cipher failure)
    SealFailed,
}

/// Terminal state of one handler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Sealed reply frame to send back to the peer
    Replied(Vec<u8>),
    Dropped(DropReason),
}

impl Outcome {
    pub fn stage(&self) -> Stage {
        match self {
            Outcome::Replied(_) => Stage::Replied,
            Outcome::Dropped(_) => Stage::Dropped,
        }
    }

    /// The reply frame, if any.
    pub fn reply(&self) -> Option<&[u8]> {
        match self {
            Outcome::Replied(frame) => Some(frame),
            Outcome::Dropped(_) => None,
        }
    }
}

/// Stateless per-datagram protocol handler.
pub struct RequestHandler<P> {
    crypto: Arc<Crypto>,
    processor: P,
    metrics: Arc<Metrics>,
    log_plaintext: bool,
}

impl<P: Processor> RequestHandler<P> {
    pub fn new(crypto: Arc<Crypto>, processor: P) -> Self {
        Self {
            crypto,
            processor,
            metrics: Arc::new(Metrics::new()),
            log_plaintext: false,
        }
    }

    /// Record into a shared metrics instance instead of a private one.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Log decrypted message text at trace level.
    pub fn with_plaintext_logging(mut self, enabled: bool) -> Self {
        self.log_plaintext = enabled;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// `Received -> Framed -> Verified`, without touching metrics.
    pub fn verify(&self, datagram: &[u8]) -> VerificationResult {
        let parts = match frame::split(datagram) {
            Ok(parts) => parts,
            Err(_) => return VerificationResult::Rejected(RejectReason::TooShort),
        };
        trace!(ciphertext_len = parts.ciphertext.len(), stage = ?Stage::Framed);

        match self
            .crypto
            .open(&parts.nonce, parts.ciphertext, &parts.tag, &[])
        {
            Ok(plaintext) => VerificationResult::Authenticated(plaintext),
            Err(_) => VerificationResult::Rejected(RejectReason::AuthenticationFailed),
        }
    }

    /// Run the full state machine for one datagram from `peer`.
    pub fn handle(&self, datagram: &[u8], peer: SocketAddr) -> Outcome {
        let _timer = Timer::start("handle_datagram");
        self.metrics.datagram_received(datagram.len() as u64);
        trace!(%peer, len = datagram.len(), stage = ?Stage::Received);

        let plaintext = match self.verify(datagram) {
            VerificationResult::Authenticated(plaintext) => plaintext,
            VerificationResult::Rejected(reason) => {
                match reason {
                    RejectReason::TooShort => {
                        self.metrics.rejected_too_short();
                        warn!(%peer, len = datagram.len(), "{}", constants::ERR_FRAME_TOO_SHORT);
                    }
                    RejectReason::AuthenticationFailed => {
                        self.metrics.rejected_auth();
                        warn!(%peer, len = datagram.len(), "{}", constants::ERR_AUTHENTICATION_FAILED);
                    }
                }
                return Outcome::Dropped(DropReason::Rejected(reason));
            }
        };

        self.metrics.authenticated();
        debug!(%peer, len = plaintext.len(), stage = ?Stage::Verified, "Datagram authenticated");
        if self.log_plaintext {
            trace!(%peer, message = %String::from_utf8_lossy(&plaintext), "Decrypted message");
        }

        let response = self.processor.process(&plaintext, peer);
        drop(plaintext);

        let Some(response) = response else {
            self.metrics.no_reply();
            trace!(%peer, stage = ?Stage::Processed, "No reply");
            return Outcome::Dropped(DropReason::NoResponse);
        };

        match self.crypto.seal_frame(&response) {
            Ok(reply) => {
                self.metrics.reply_sent(reply.len() as u64);
                trace!(%peer, len = reply.len(), stage = ?Stage::Replied);
                Outcome::Replied(reply)
            }
            Err(e) => {
                self.metrics.seal_failure();
                let msg = match e {
                    AeadError::RandomnessUnavailable => constants::ERR_RANDOMNESS_UNAVAILABLE,
                    _ => constants::ERR_ENCRYPTION_FAILED,
                };
                error!(%peer, "{msg}");
                Outcome::Dropped(DropReason::SealFailed)
            }
        }
    }
}
