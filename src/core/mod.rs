//! # Core Protocol Components
//!
//! Low-level datagram framing.
//!
//! ## Components
//! - **Frame**: fixed-offset split/join of nonce, ciphertext and tag
//!
//! ## Wire Format
//! ```text
//! [Nonce(12)] [Ciphertext(N)] [Tag(16)]
//! ```
//!
//! ## Security
//! - Length is checked before any slicing or cipher work
//! - Minimum frame: 28 bytes; maximum: one UDP payload (65,507 bytes)

pub mod frame;
