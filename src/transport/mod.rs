//! # Transport Layer
//!
//! Socket ownership for the sealed datagram protocol. The protocol core
//! never touches a socket; it is handed datagrams and returns replies.
//!
//! ## Components
//! - **UDP**: `DatagramTransport` trait, tokio `UdpSocket` adapter, receive loop

pub mod udp;

pub use udp::{serve, DatagramTransport, ServeOptions, RECEIVE_BACKOFF_MAX};
