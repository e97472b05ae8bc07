//! Injectable crypto capability
//!
//! The envelope engine talks to cryptography only through [`CryptoProvider`].
//! Each implementation owns its random source; nothing reads ambient
//! global RNG state.

use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::aead::{self, SealedPayload};
use crate::error::CryptoResult;
use crate::keys::{self, RsaKeyPair, SessionKey};
use crate::wrap;

/// The primitive operations of envelope encryption.
pub trait CryptoProvider: Send + Sync {
    fn generate_session_key(&self) -> CryptoResult<SessionKey>;

    fn generate_key_pair(&self, bits: usize) -> CryptoResult<RsaKeyPair>;

    fn seal(&self, key: &SessionKey, plaintext: &[u8]) -> CryptoResult<SealedPayload>;

    fn open(
        &self,
        key: &SessionKey,
        ciphertext: &[u8],
        iv: &[u8],
        tag: &[u8],
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        aead::decrypt(key, ciphertext, iv, tag)
    }

    fn wrap_key(&self, raw_key: &[u8], public: &RsaPublicKey) -> CryptoResult<Vec<u8>>;

    fn unwrap_key(
        &self,
        wrapped: &[u8],
        private: &RsaPrivateKey,
    ) -> CryptoResult<Zeroizing<Vec<u8>>>;
}

/// Production provider backed by the operating system's CSPRNG.
///
/// `OsRng` is stateless, so concurrent calls share nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCrypto;

impl CryptoProvider for SystemCrypto {
    fn generate_session_key(&self) -> CryptoResult<SessionKey> {
        keys::generate_session_key(&mut OsRng)
    }

    fn generate_key_pair(&self, bits: usize) -> CryptoResult<RsaKeyPair> {
        keys::generate_key_pair(&mut OsRng, bits)
    }

    fn seal(&self, key: &SessionKey, plaintext: &[u8]) -> CryptoResult<SealedPayload> {
        aead::encrypt(&mut OsRng, key, plaintext)
    }

    fn wrap_key(&self, raw_key: &[u8], public: &RsaPublicKey) -> CryptoResult<Vec<u8>> {
        wrap::wrap_key(&mut OsRng, raw_key, public)
    }

    fn unwrap_key(
        &self,
        wrapped: &[u8],
        private: &RsaPrivateKey,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        wrap::unwrap_key(&mut OsRng, wrapped, private)
    }
}

/// Deterministic provider for reproducible test vectors.
///
/// Two instances built from the same seed produce the same keys, IVs and
/// wrapped keys for the same sequence of calls. Never use outside tests.
pub struct SeededCrypto {
    rng: Mutex<ChaCha20Rng>,
}

impl SeededCrypto {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut ChaCha20Rng) -> T) -> T {
        // Poisoning leaves the RNG state usable
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }
}

impl std::fmt::Debug for SeededCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededCrypto").finish_non_exhaustive()
    }
}

impl CryptoProvider for SeededCrypto {
    fn generate_session_key(&self) -> CryptoResult<SessionKey> {
        self.with_rng(|rng| keys::generate_session_key(rng))
    }

    fn generate_key_pair(&self, bits: usize) -> CryptoResult<RsaKeyPair> {
        self.with_rng(|rng| keys::generate_key_pair(rng, bits))
    }

    fn seal(&self, key: &SessionKey, plaintext: &[u8]) -> CryptoResult<SealedPayload> {
        self.with_rng(|rng| aead::encrypt(rng, key, plaintext))
    }

    fn wrap_key(&self, raw_key: &[u8], public: &RsaPublicKey) -> CryptoResult<Vec<u8>> {
        self.with_rng(|rng| wrap::wrap_key(rng, raw_key, public))
    }

    fn unwrap_key(
        &self,
        wrapped: &[u8],
        private: &RsaPrivateKey,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        self.with_rng(|rng| wrap::unwrap_key(rng, wrapped, private))
    }
}
