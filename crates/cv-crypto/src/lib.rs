//! cv-crypto: primitives behind cryptovault's envelope encryption
//!
//! ```text
//! RSA key pair (2048/3072-bit, long-lived, owned by a user)
//!   └── wraps: session key (AES-256, one per document, RSA-OAEP/SHA-256)
//!         └── encrypts: document payload (AES-256-GCM, random 96-bit IV, detached 128-bit tag)
//! ```
//!
//! Every primitive takes its random source explicitly. `CryptoProvider`
//! bundles them behind one injectable interface; `SystemCrypto` draws from
//! the OS, `SeededCrypto` from a seeded ChaCha20 stream for reproducible tests.

pub mod aead;
pub mod digest;
pub mod error;
pub mod keys;
pub mod provider;
pub mod wrap;

pub use aead::{decrypt, encrypt, SealedPayload};
pub use digest::{digest_matches, sha256, sha256_hex};
pub use error::{CryptoError, CryptoResult};
pub use keys::{
    decode_private_key, decode_public_key, generate_key_pair, generate_session_key, RsaKeyPair,
    SessionKey, RSA_KEY_SIZES,
};
pub use provider::{CryptoProvider, SeededCrypto, SystemCrypto};
pub use wrap::{max_wrap_len, unwrap_key, wrap_key};

pub use rsa::{RsaPrivateKey, RsaPublicKey};

/// Size of an AES-256 session key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM IV (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag (128-bit)
pub const TAG_SIZE: usize = 16;
