//! AES-256-GCM payload encryption with a detached tag
//!
//! Output is a triple rather than one framed buffer:
//! ```text
//! iv:         12 bytes, fresh from the random source on every call
//! ciphertext: same length as the plaintext
//! tag:        16 bytes (128-bit GCM tag)
//! ```
//! The three parts are stored separately (IV and tag in the document record,
//! ciphertext in the blob store). No associated data is bound.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SessionKey;
use crate::{IV_SIZE, TAG_SIZE};

/// Ciphertext plus the IV and tag needed to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_SIZE],
    pub tag: [u8; TAG_SIZE],
}

fn cipher_for(key: &SessionKey) -> CryptoResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::CipherInit(format!("AES-256-GCM key: {e}")))
}

/// Encrypt `plaintext` under `key` with a fresh random IV.
pub fn encrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    key: &SessionKey,
    plaintext: &[u8],
) -> CryptoResult<SealedPayload> {
    let cipher = cipher_for(key)?;

    let mut iv = [0u8; IV_SIZE];
    rng.try_fill_bytes(&mut iv)
        .map_err(|e| CryptoError::AlgorithmUnavailable(format!("secure random source: {e}")))?;

    // Holds plaintext until encryption succeeds
    let mut buffer = Zeroizing::new(plaintext.to_vec());
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", buffer.as_mut_slice())
        .map_err(|_| CryptoError::CipherInit("payload exceeds AES-GCM limits".into()))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(SealedPayload {
        ciphertext: std::mem::take(&mut *buffer),
        iv,
        tag: tag_bytes,
    })
}

/// Verify and decrypt. A tag mismatch is always `AuthenticationFailed`;
/// a malformed IV or tag length is `CipherInit`.
pub fn decrypt(
    key: &SessionKey,
    ciphertext: &[u8],
    iv: &[u8],
    tag: &[u8],
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if iv.len() != IV_SIZE {
        return Err(CryptoError::CipherInit(format!(
            "IV must be {IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    if tag.len() != TAG_SIZE {
        return Err(CryptoError::CipherInit(format!(
            "tag must be {TAG_SIZE} bytes, got {}",
            tag.len()
        )));
    }

    let cipher = cipher_for(key)?;
    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(iv),
            b"",
            buffer.as_mut_slice(),
            Tag::from_slice(tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    Ok(buffer)
}
