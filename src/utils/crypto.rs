//! # AEAD Engine
//!
//! ChaCha20-Poly1305 (RFC 8439) seal and open with a pre-shared 256-bit key.
//!
//! ## Guarantees
//! - `open` verifies the Poly1305 tag in constant time *before* the keystream
//!   is applied; a rejected frame never yields plaintext, partial or whole
//! - `seal` is deterministic for identical inputs; callers must supply a
//!   fresh nonce for every message
//! - Nonces come from the OS CSPRNG (96 random bits), which is safe to call
//!   from many threads at once
//! - Key bytes are wiped on drop and never printed
//!
//! ## Example
//! ```rust
//! use secure_datagram::utils::crypto::{Crypto, SymmetricKey};
//!
//! let crypto = Crypto::new(&SymmetricKey::from_bytes([0x42; 32]));
//! let frame = crypto.seal_frame(b"Hello, Server!").expect("seal");
//! let plaintext = crypto.open_frame(&frame).expect("open");
//! assert_eq!(&plaintext[..], b"Hello, Server!");
//! ```

use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce as CipherNonce, Tag as CipherTag};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

use crate::core::frame::{self, Nonce, Tag, NONCE_LEN, TAG_LEN};
use crate::error::{constants, AeadError, ProtocolError, Result};

/// Required key length for ChaCha20-Poly1305
pub const KEY_LEN: usize = 32;

/// Recovered plaintext. Wiped from memory when dropped.
pub type Plaintext = Zeroizing<Vec<u8>>;

/// Pre-shared 256-bit secret. Zeroized on drop; `Debug` is redacted.
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a key from an arbitrary slice, rejecting any length but 32.
    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, AeadError> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| AeadError::KeyLengthInvalid {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Decode a 64-character hex string.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(hex::decode(encoded.trim()).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_INVALID_KEY_HEX))
        })?);
        Ok(Self::from_slice(&decoded)?)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// ChaCha20-Poly1305 engine bound to one key. Cheap to share behind an `Arc`;
/// every method takes `&self`.
pub struct Crypto {
    cipher: ChaCha20Poly1305,
}

impl Crypto {
    pub fn new(key: &SymmetricKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
        }
    }

    /// Build an engine straight from raw key bytes.
    ///
    /// A wrong length is a startup error ([`AeadError::KeyLengthInvalid`]).
    pub fn from_slice(key: &[u8]) -> std::result::Result<Self, AeadError> {
        let key = SymmetricKey::from_slice(key)?;
        Ok(Self::new(&key))
    }

    /// Encrypt `plaintext` under `nonce`, binding `aad`.
    ///
    /// Returns the ciphertext (same length as the plaintext) and the detached tag.
    pub fn seal(
        &self,
        nonce: &Nonce,
        plaintext: &[u8],
        aad: &[u8],
    ) -> std::result::Result<(Vec<u8>, Tag), AeadError> {
        let mut buffer = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(CipherNonce::from_slice(nonce), aad, &mut buffer)
            .map_err(|_| AeadError::EncryptionFailed)?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(&tag);
        Ok((buffer, tag_bytes))
    }

    /// Verify `tag` over `(nonce, ciphertext, aad)` and decrypt.
    ///
    /// The tag check happens before decryption. On mismatch the working
    /// buffer still holds ciphertext and is discarded.
    pub fn open(
        &self,
        nonce: &Nonce,
        ciphertext: &[u8],
        tag: &Tag,
        aad: &[u8],
    ) -> std::result::Result<Plaintext, AeadError> {
        let mut buffer = Zeroizing::new(ciphertext.to_vec());
        self.cipher
            .decrypt_in_place_detached(
                CipherNonce::from_slice(nonce),
                aad,
                &mut buffer,
                CipherTag::from_slice(tag),
            )
            .map_err(|_| AeadError::AuthenticationFailed)?;
        Ok(buffer)
    }

    /// Draw a fresh 96-bit nonce from the OS CSPRNG.
    pub fn generate_nonce() -> std::result::Result<Nonce, AeadError> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce).map_err(|_| AeadError::RandomnessUnavailable)?;
        Ok(nonce)
    }

    /// Seal `plaintext` under a fresh nonce with empty AAD and frame it for the wire.
    pub fn seal_frame(&self, plaintext: &[u8]) -> std::result::Result<Vec<u8>, AeadError> {
        let nonce = Self::generate_nonce()?;
        let (ciphertext, tag) = self.seal(&nonce, plaintext, &[])?;
        Ok(frame::join(&nonce, &ciphertext, &tag))
    }

    /// Split a wire frame and open it with empty AAD.
    pub fn open_frame(&self, datagram: &[u8]) -> Result<Plaintext> {
        let parts = frame::split(datagram)?;
        let plaintext = self.open(&parts.nonce, parts.ciphertext, &parts.tag, &[])?;
        Ok(plaintext)
    }
}

impl fmt::Debug for Crypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crypto")
            .field("algorithm", &"ChaCha20-Poly1305")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn rfc8439_key() -> SymmetricKey {
        let mut key = [0u8; KEY_LEN];
        for (i, b) in key.iter_mut().enumerate() {
            *b = 0x80 + i as u8;
        }
        SymmetricKey::from_bytes(key)
    }

    // RFC 8439 section 2.8.2
    const RFC_PLAINTEXT: &[u8] = b"Ladies and Gentlemen of the class of '99: If I could offer you only one tip for the future, sunscreen would be it.";
    const RFC_NONCE: &str = "070000004041424344454647";
    const RFC_AAD: &str = "50515253c0c1c2c3c4c5c6c7";
    const RFC_CIPHERTEXT: &str = "d31a8d34648e60db7b86afbc53ef7ec2a4aded51296e08fea9e2b5a736ee62d63dbea45e8ca9671282fafb69da92728b1a71de0a9e060b2905d6a5b67ecd3b3692ddbd7f2d778b8c9803aee328091b58fab324e4fad675945585808b4831d7bc3ff4def08e4b7a9de576d26586cec64b6116";
    const RFC_TAG: &str = "1ae10b594f09e26a7e902ecbd0600691";

    fn nonce_from_hex(s: &str) -> Nonce {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    #[test]
    fn seal_matches_rfc8439_vector() {
        let crypto = Crypto::new(&rfc8439_key());
        let nonce = nonce_from_hex(RFC_NONCE);
        let aad = hex::decode(RFC_AAD).unwrap();

        let (ciphertext, tag) = crypto.seal(&nonce, RFC_PLAINTEXT, &aad).unwrap();
        assert_eq!(hex::encode(ciphertext), RFC_CIPHERTEXT);
        assert_eq!(hex::encode(tag), RFC_TAG);
    }

    #[test]
    fn open_matches_rfc8439_vector() {
        let crypto = Crypto::new(&rfc8439_key());
        let nonce = nonce_from_hex(RFC_NONCE);
        let aad = hex::decode(RFC_AAD).unwrap();
        let ciphertext = hex::decode(RFC_CIPHERTEXT).unwrap();
        let tag: Tag = hex::decode(RFC_TAG).unwrap().try_into().unwrap();

        let plaintext = crypto.open(&nonce, &ciphertext, &tag, &aad).unwrap();
        assert_eq!(&plaintext[..], RFC_PLAINTEXT);
    }

    #[test]
    fn open_rejects_missing_aad() {
        let crypto = Crypto::new(&rfc8439_key());
        let nonce = nonce_from_hex(RFC_NONCE);
        let ciphertext = hex::decode(RFC_CIPHERTEXT).unwrap();
        let tag: Tag = hex::decode(RFC_TAG).unwrap().try_into().unwrap();

        let result = crypto.open(&nonce, &ciphertext, &tag, &[]);
        assert_eq!(result, Err(AeadError::AuthenticationFailed));
    }

    #[test]
    fn ciphertext_length_equals_plaintext_length() {
        let crypto = Crypto::new(&SymmetricKey::from_bytes([1; KEY_LEN]));
        let (ciphertext, _) = crypto.seal(&[0; NONCE_LEN], b"fourteen bytes", &[]).unwrap();
        assert_eq!(ciphertext.len(), 14);
        let (empty, tag) = crypto.seal(&[0; NONCE_LEN], b"", &[]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(tag.len(), TAG_LEN);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        let err = Crypto::from_slice(&[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            AeadError::KeyLengthInvalid {
                expected: 32,
                actual: 16
            }
        );
    }

    #[test]
    fn from_hex_decodes_and_checks_length() {
        let key = SymmetricKey::from_hex(
            "d38a3b96a26d0b1139bd30c174884f5dbc8eaaf492493725633ecebfa4ab19e9",
        )
        .unwrap();
        assert_eq!(key.as_bytes()[0], 0xd3);
        assert_eq!(key.as_bytes()[31], 0xe9);

        assert!(matches!(
            SymmetricKey::from_hex("d38a3b96"),
            Err(ProtocolError::Aead(AeadError::KeyLengthInvalid { actual: 4, .. }))
        ));
        assert!(matches!(
            SymmetricKey::from_hex("example123"),
            Err(ProtocolError::ConfigError(_))
        ));
    }

    #[test]
    fn debug_output_redacts_key() {
        let key = SymmetricKey::from_bytes([0xAB; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "SymmetricKey(<redacted>)");
    }
}
