use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};

/// Whether a key record holds a bare symmetric key or an RSA key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    Symmetric,
    Asymmetric,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Symmetric => write!(f, "Symmetric"),
            KeyKind::Asymmetric => write!(f, "Asymmetric"),
        }
    }
}

impl FromStr for KeyKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "symmetric" | "aes" => Ok(KeyKind::Symmetric),
            "asymmetric" | "rsa" => Ok(KeyKind::Asymmetric),
            other => Err(VaultError::InvalidInput(format!(
                "unknown key kind '{other}' (expected symmetric or asymmetric)"
            ))),
        }
    }
}

/// Algorithm tag persisted with every key record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
    #[serde(rename = "RSA-2048-OAEP")]
    Rsa2048Oaep,
    #[serde(rename = "RSA-3072-OAEP")]
    Rsa3072Oaep,
}

impl Algorithm {
    pub fn kind(&self) -> KeyKind {
        match self {
            Algorithm::Aes256Gcm => KeyKind::Symmetric,
            Algorithm::Rsa2048Oaep | Algorithm::Rsa3072Oaep => KeyKind::Asymmetric,
        }
    }

    /// RSA modulus size in bits, `None` for symmetric algorithms.
    pub fn rsa_bits(&self) -> Option<usize> {
        match self {
            Algorithm::Aes256Gcm => None,
            Algorithm::Rsa2048Oaep => Some(2048),
            Algorithm::Rsa3072Oaep => Some(3072),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "AES-256-GCM",
            Algorithm::Rsa2048Oaep => "RSA-2048-OAEP",
            Algorithm::Rsa3072Oaep => "RSA-3072-OAEP",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = VaultError;

    /// Accepts both the persisted tags (`RSA-3072-OAEP`) and the underscore
    /// spelling (`RSA_3072_OAEP`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('_', "-").as_str() {
            "AES-256-GCM" => Ok(Algorithm::Aes256Gcm),
            "RSA-2048-OAEP" => Ok(Algorithm::Rsa2048Oaep),
            "RSA-3072-OAEP" => Ok(Algorithm::Rsa3072Oaep),
            _ => Err(VaultError::InvalidInput(format!("unknown algorithm '{s}'"))),
        }
    }
}

/// A long-lived key owned by one user.
///
/// `key_material` is base64: the raw 32 key bytes for `Symmetric` records,
/// the PKCS#8 DER private key for `Asymmetric` ones. `public_key` is the
/// base64 SPKI DER public key and is present only for `Asymmetric` records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: Uuid,
    pub owner: String,
    pub kind: KeyKind,
    pub algorithm: Algorithm,
    pub key_material: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Unix timestamp (seconds)
    pub created_at: u64,
}

impl KeyRecord {
    pub fn symmetric(owner: impl Into<String>, key_material: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            kind: KeyKind::Symmetric,
            algorithm: Algorithm::Aes256Gcm,
            key_material,
            public_key: None,
            created_at: unix_now(),
        }
    }

    pub fn asymmetric(
        owner: impl Into<String>,
        algorithm: Algorithm,
        private_key: String,
        public_key: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            kind: KeyKind::Asymmetric,
            algorithm,
            key_material: private_key,
            public_key: Some(public_key),
            created_at: unix_now(),
        }
    }

    /// Check the kind/algorithm/public-key invariants.
    pub fn validate(&self) -> VaultResult<()> {
        if self.algorithm.kind() != self.kind {
            return Err(VaultError::InvalidInput(format!(
                "key {}: algorithm {} does not match kind {}",
                self.id, self.algorithm, self.kind
            )));
        }
        match (self.kind, &self.public_key) {
            (KeyKind::Symmetric, Some(_)) => Err(VaultError::InvalidInput(format!(
                "key {}: symmetric keys must not carry public key material",
                self.id
            ))),
            (KeyKind::Asymmetric, None) => Err(VaultError::InvalidInput(format!(
                "key {}: asymmetric keys must carry public key material",
                self.id
            ))),
            _ => Ok(()),
        }
    }
}

/// Metadata for one encrypted document. The ciphertext itself lives in the
/// blob store under `blob_handle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub original_size: u64,
    /// SHA-256 of the original plaintext (lowercase hex)
    pub sha256: String,
    /// AES-GCM IV, base64 of 12 bytes
    pub iv: String,
    /// AES-GCM tag, base64 of 16 bytes
    pub tag: String,
    /// Session key wrapped under the recipient's RSA key (base64)
    pub wrapped_key: String,
    pub blob_handle: String,
    pub key_id: Uuid,
    /// Unix timestamp (seconds)
    pub created_at: u64,
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
