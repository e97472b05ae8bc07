//! Key material: one-time AES-256 session keys and long-lived RSA key pairs

use rand::{CryptoRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, CryptoResult};
use crate::KEY_SIZE;

/// Accepted RSA modulus sizes in bits
pub const RSA_KEY_SIZES: [usize; 2] = [2048, 3072];

/// A 256-bit AES session key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Rebuild a key from unwrapped bytes. Anything but 32 bytes is a
    /// `CipherInit` error.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::CipherInit(format!(
                "AES-256 key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit session key.
pub fn generate_session_key<R: RngCore + CryptoRng>(rng: &mut R) -> CryptoResult<SessionKey> {
    let mut bytes = [0u8; KEY_SIZE];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::AlgorithmUnavailable(format!("secure random source: {e}")))?;
    let key = SessionKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// An RSA key pair. The private half zeroizes itself on drop.
#[derive(Clone)]
pub struct RsaKeyPair {
    pub private: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl RsaKeyPair {
    pub fn from_private(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        Self { private, public }
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    /// PKCS#8 DER encoding of the private key.
    pub fn private_der(&self) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let doc = self
            .private
            .to_pkcs8_der()
            .map_err(|e| CryptoError::Encoding(format!("PKCS#8 private key: {e}")))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// SPKI (X.509 SubjectPublicKeyInfo) DER encoding of the public key.
    pub fn public_der(&self) -> CryptoResult<Vec<u8>> {
        let doc = self
            .public
            .to_public_key_der()
            .map_err(|e| CryptoError::Encoding(format!("SPKI public key: {e}")))?;
        Ok(doc.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("bits", &self.bits())
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// Generate an RSA key pair. `bits` must be one of [`RSA_KEY_SIZES`].
pub fn generate_key_pair<R: RngCore + CryptoRng>(
    rng: &mut R,
    bits: usize,
) -> CryptoResult<RsaKeyPair> {
    if !RSA_KEY_SIZES.contains(&bits) {
        return Err(CryptoError::InvalidParameter(format!(
            "RSA key size must be one of {RSA_KEY_SIZES:?}, got {bits}"
        )));
    }

    let private = RsaPrivateKey::new(rng, bits)
        .map_err(|e| CryptoError::AlgorithmUnavailable(format!("RSA key generation: {e}")))?;
    tracing::debug!(bits, "generated RSA key pair");
    Ok(RsaKeyPair::from_private(private))
}

/// Decode a PKCS#8 DER private key.
pub fn decode_private_key(der: &[u8]) -> CryptoResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| CryptoError::InvalidKey(format!("not an RSA PKCS#8 private key: {e}")))
}

/// Decode an SPKI DER public key.
pub fn decode_public_key(der: &[u8]) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(der)
        .map_err(|e| CryptoError::InvalidKey(format!("not an RSA SPKI public key: {e}")))
}
