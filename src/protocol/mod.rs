//! # Protocol Layer
//!
//! Per-datagram processing on top of the frame codec and AEAD engine.
//!
//! ## Components
//! - **Handler**: framing, verification, processing and reply sealing for one datagram
//! - **Processor**: the application hook that sees authenticated plaintext

pub mod handler;
pub mod processor;

pub use handler::{DropReason, Outcome, RejectReason, RequestHandler, Stage, VerificationResult};
pub use processor::{
    resolve_destination, DiscardProcessor, EchoProcessor, ForwardProcessor, Processor,
};
