//! cv-envelope: envelope encryption of documents
//!
//! Every document gets a one-time AES-256 session key. The payload is sealed
//! with AES-256-GCM, the session key is wrapped under the recipient's RSA
//! key, and the ciphertext and its record are persisted separately:
//!
//! ```text
//! plaintext ─ sha256 ──────────────────────────────────► record.sha256
//!     └─ AES-256-GCM(session key) ─► ciphertext ───────► blob store
//!                                 └► iv, tag ──────────► record.iv, record.tag
//! session key ─ RSA-OAEP(owner public key) ────────────► record.wrapped_key
//! ```
//!
//! Decryption runs the inverse and re-checks the plaintext digest.

pub mod engine;
pub mod error;
pub mod keys;

pub use engine::{EncryptStage, EnvelopeEngine};
pub use error::{EnvelopeError, EnvelopeResult, ErrorKind};
pub use keys::{KeyStats, KeyUsage};
