use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("algorithm unavailable: {0}")]
    AlgorithmUnavailable(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("cipher initialization failed: {0}")]
    CipherInit(String),

    /// The GCM tag did not verify. Never retried.
    #[error("authentication failed: ciphertext, IV, or tag does not verify")]
    AuthenticationFailed,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("payload too large to wrap: {len} bytes (OAEP capacity {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// Deliberately carries no detail about padding vs. ciphertext failures.
    #[error("key unwrap failed")]
    UnwrapFailed,

    #[error("key encoding failed: {0}")]
    Encoding(String),
}
