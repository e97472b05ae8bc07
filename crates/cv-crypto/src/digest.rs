//! SHA-256 integrity digests of document plaintexts

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Size of a SHA-256 digest in bytes
pub const DIGEST_SIZE: usize = 32;

pub fn sha256(data: &[u8]) -> [u8; DIGEST_SIZE] {
    Sha256::digest(data).into()
}

/// Lowercase hex SHA-256, the form stored in document records.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Constant-time comparison of a computed digest against a stored hex digest.
///
/// A stored value that is not 64 hex characters never matches.
pub fn digest_matches(computed: &[u8; DIGEST_SIZE], expected_hex: &str) -> bool {
    let mut expected = [0u8; DIGEST_SIZE];
    if hex::decode_to_slice(expected_hex, &mut expected).is_err() {
        return false;
    }
    computed.ct_eq(&expected).into()
}
