//! RSA-OAEP key wrapping
//!
//! OAEP uses SHA-256 for both the label hash and MGF1, with the empty label.
//! A wrapped key is exactly one modulus long (256 bytes for RSA-2048, 384 for
//! RSA-3072).

use rand::{CryptoRng, RngCore};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

const OAEP_HASH_LEN: usize = 32;

/// Largest payload OAEP(SHA-256) can wrap under `public`: `k - 2·hLen - 2`.
pub fn max_wrap_len(public: &RsaPublicKey) -> usize {
    public.size().saturating_sub(2 * OAEP_HASH_LEN + 2)
}

/// Wrap raw key bytes under an RSA public key.
pub fn wrap_key<R: RngCore + CryptoRng>(
    rng: &mut R,
    raw_key: &[u8],
    public: &RsaPublicKey,
) -> CryptoResult<Vec<u8>> {
    let max = max_wrap_len(public);
    if raw_key.len() > max {
        return Err(CryptoError::PayloadTooLarge {
            len: raw_key.len(),
            max,
        });
    }

    public
        .encrypt(rng, Oaep::new::<Sha256>(), raw_key)
        .map_err(|e| CryptoError::InvalidKey(format!("RSA-OAEP wrap: {e}")))
}

/// Unwrap key bytes with an RSA private key.
///
/// Every failure collapses into `UnwrapFailed`. Decryption is blinded with
/// fresh randomness from `rng`.
pub fn unwrap_key<R: RngCore + CryptoRng>(
    rng: &mut R,
    wrapped: &[u8],
    private: &RsaPrivateKey,
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if wrapped.len() != private.size() {
        return Err(CryptoError::UnwrapFailed);
    }

    private
        .decrypt_blinded(rng, Oaep::new::<Sha256>(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::UnwrapFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_key_pair, generate_session_key};
    use rand::rngs::OsRng;

    #[test]
    fn test_wrap_unwrap_roundtrip_2048() {
        let pair = generate_key_pair(&mut OsRng, 2048).unwrap();
        let session = generate_session_key(&mut OsRng).unwrap();

        let wrapped = wrap_key(&mut OsRng, session.as_bytes(), &pair.public).unwrap();
        assert_eq!(wrapped.len(), 256);

        let unwrapped = unwrap_key(&mut OsRng, &wrapped, &pair.private).unwrap();
        assert_eq!(unwrapped.as_slice(), session.as_bytes());
    }

    #[test]
    fn test_capacity() {
        let pair = generate_key_pair(&mut OsRng, 2048).unwrap();
        assert_eq!(max_wrap_len(&pair.public), 256 - 66);

        let at_limit = vec![7u8; 190];
        assert!(wrap_key(&mut OsRng, &at_limit, &pair.public).is_ok());

        let over = vec![7u8; 191];
        let err = wrap_key(&mut OsRng, &over, &pair.public).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::PayloadTooLarge { len: 191, max: 190 }
        ));
    }

    #[test]
    fn test_unwrap_with_wrong_key_is_opaque() {
        let alice = generate_key_pair(&mut OsRng, 2048).unwrap();
        let mallory = generate_key_pair(&mut OsRng, 2048).unwrap();

        let wrapped = wrap_key(&mut OsRng, &[1u8; 32], &alice.public).unwrap();
        let err = unwrap_key(&mut OsRng, &wrapped, &mallory.private).unwrap_err();
        assert!(matches!(err, CryptoError::UnwrapFailed));
    }

    #[test]
    fn test_unwrap_corrupted_and_truncated() {
        let pair = generate_key_pair(&mut OsRng, 2048).unwrap();
        let mut wrapped = wrap_key(&mut OsRng, &[9u8; 32], &pair.public).unwrap();

        let truncated = unwrap_key(&mut OsRng, &wrapped[..100], &pair.private).unwrap_err();
        assert!(matches!(truncated, CryptoError::UnwrapFailed));

        wrapped[10] ^= 0xFF;
        let corrupted = unwrap_key(&mut OsRng, &wrapped, &pair.private).unwrap_err();
        assert!(matches!(corrupted, CryptoError::UnwrapFailed));

        // Both failures render identically
        assert_eq!(truncated.to_string(), corrupted.to_string());
    }
}
