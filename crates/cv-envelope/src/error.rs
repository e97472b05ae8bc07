use std::time::Duration;

use cv_core::{KeyKind, VaultError};
use cv_crypto::CryptoError;
use thiserror::Error;
use uuid::Uuid;

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Broad class of an [`EnvelopeError`], for callers that map errors to
/// responses or exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing key, document, or blob
    NotFound,
    /// Caller error: wrong key kind, bad parameter, key still in use
    InvalidInput,
    /// Tampering or corruption detected. Never retried.
    Security,
    /// Platform or configuration problem
    Environment,
    /// Store I/O failure
    Storage,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("key {key_id} is {kind}; documents can only be encrypted for asymmetric keys")]
    WrongKeyKind { key_id: Uuid, kind: KeyKind },

    #[error("key {key_id} still protects {documents} document(s)")]
    KeyInUse { key_id: Uuid, documents: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("authentication failed: ciphertext, IV, or tag does not verify")]
    AuthenticationFailed,

    #[error("integrity violation: document {document_id} does not match its stored digest")]
    IntegrityViolation { document_id: Uuid },

    #[error("key unwrap failed")]
    UnwrapFailed,

    #[error("cipher initialization failed: {0}")]
    CipherInit(String),

    #[error("algorithm unavailable: {0}")]
    AlgorithmUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl EnvelopeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnvelopeError::NotFound(_) => ErrorKind::NotFound,
            EnvelopeError::WrongKeyKind { .. }
            | EnvelopeError::KeyInUse { .. }
            | EnvelopeError::InvalidInput(_)
            | EnvelopeError::InvalidKey(_) => ErrorKind::InvalidInput,
            EnvelopeError::AuthenticationFailed
            | EnvelopeError::IntegrityViolation { .. }
            | EnvelopeError::UnwrapFailed => ErrorKind::Security,
            EnvelopeError::CipherInit(_) | EnvelopeError::AlgorithmUnavailable(_) => {
                ErrorKind::Environment
            }
            EnvelopeError::Storage(_) => ErrorKind::Storage,
            EnvelopeError::Timeout(_) => ErrorKind::Cancelled,
        }
    }

    pub fn is_security_event(&self) -> bool {
        self.kind() == ErrorKind::Security
    }
}

impl From<CryptoError> for EnvelopeError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AlgorithmUnavailable(m) => EnvelopeError::AlgorithmUnavailable(m),
            CryptoError::InvalidParameter(m) => EnvelopeError::InvalidInput(m),
            CryptoError::CipherInit(m) => EnvelopeError::CipherInit(m),
            CryptoError::AuthenticationFailed => EnvelopeError::AuthenticationFailed,
            CryptoError::InvalidKey(m) => EnvelopeError::InvalidKey(m),
            e @ CryptoError::PayloadTooLarge { .. } => EnvelopeError::InvalidInput(e.to_string()),
            CryptoError::UnwrapFailed => EnvelopeError::UnwrapFailed,
            CryptoError::Encoding(m) => EnvelopeError::AlgorithmUnavailable(m),
        }
    }
}

impl From<VaultError> for EnvelopeError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::NotFound(m) => EnvelopeError::NotFound(m),
            VaultError::InvalidInput(m) => EnvelopeError::InvalidInput(m),
            other => EnvelopeError::Storage(other.to_string()),
        }
    }
}
