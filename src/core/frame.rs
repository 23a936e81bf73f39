//! # Frame Codec
//!
//! Fixed-offset slicing of one datagram into its three fields and back.
//!
//! ## Wire Format
//! ```text
//! [Nonce(12)] [Ciphertext(N)] [Tag(16)]
//! ```
//!
//! `N` equals the plaintext length and may be zero, so the smallest valid
//! frame is 28 bytes. Nothing here touches the cipher: a frame that splits
//! cleanly can still fail authentication.

use crate::error::FrameError;

/// ChaCha20-Poly1305 nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// Poly1305 tag length in bytes
pub const TAG_LEN: usize = 16;

/// Smallest datagram that can hold a frame (empty plaintext)
pub const MIN_FRAME_LEN: usize = NONCE_LEN + TAG_LEN;

/// Largest payload a single UDP datagram can carry over IPv4
pub const MAX_DATAGRAM_LEN: usize = 65_507;

/// 96-bit nonce as carried on the wire
pub type Nonce = [u8; NONCE_LEN];

/// 128-bit authentication tag as carried on the wire
pub type Tag = [u8; TAG_LEN];

/// A datagram split into its fields. The ciphertext borrows from the
/// datagram; nonce and tag are copied out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameParts<'a> {
    pub nonce: Nonce,
    pub ciphertext: &'a [u8],
    pub tag: Tag,
}

impl FrameParts<'_> {
    /// Total wire length of this frame.
    #[inline]
    pub fn wire_len(&self) -> usize {
        NONCE_LEN + self.ciphertext.len() + TAG_LEN
    }
}

/// Split a raw datagram into nonce, ciphertext and tag.
///
/// Fails with [`FrameError::TooShort`] when the datagram cannot hold both
/// a nonce and a tag.
pub fn split(datagram: &[u8]) -> Result<FrameParts<'_>, FrameError> {
    if datagram.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort {
            len: datagram.len(),
        });
    }

    let (nonce_bytes, rest) = datagram.split_at(NONCE_LEN);
    let (ciphertext, tag_bytes) = rest.split_at(rest.len() - TAG_LEN);

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(nonce_bytes);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(tag_bytes);

    Ok(FrameParts {
        nonce,
        ciphertext,
        tag,
    })
}

/// Join nonce, ciphertext and tag into one datagram.
pub fn join(nonce: &Nonce, ciphertext: &[u8], tag: &Tag) -> Vec<u8> {
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len() + TAG_LEN);
    out.extend_from_slice(nonce);
    out.extend_from_slice(ciphertext);
    out.extend_from_slice(tag);
    out
}
