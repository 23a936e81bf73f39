//! # Services
//!
//! Ready-made endpoints assembled from the protocol and transport layers.
//!
//! - **Relay**: one UDP listener per configured bind address, each echoing,
//!   forwarding or discarding authenticated plaintext
//! - **Client**: seals requests and opens replies

pub mod client;
pub mod relay;

pub use client::SecureDatagramClient;
pub use relay::{BoundRelay, ListenerProcessor, Relay};
