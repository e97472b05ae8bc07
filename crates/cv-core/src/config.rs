use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::Algorithm;

/// Top-level configuration (loaded from cryptovault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub crypto: CryptoConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info). `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Where ciphertext blobs are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    /// Local directory under `root`
    Fs,
    /// Process memory (lost on exit; tests and dry runs)
    Memory,
    /// S3-compatible endpoint
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BlobBackend,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Object prefix inside the bucket/root
    pub prefix: String,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket name
    pub bucket: String,
    /// Refuse plaintext HTTP S3 endpoints
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON file holding key and document records
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Algorithm used when an asymmetric key is generated without one
    pub default_asymmetric_algorithm: Algorithm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for one encrypt/decrypt workflow, in seconds (0 = no limit)
    pub operation_timeout_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::Fs,
            root: PathBuf::from("./vault-data/blobs"),
            prefix: "documents".into(),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "cryptovault".into(),
            enforce_tls: false,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./vault-data/catalog.json"),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            default_asymmetric_algorithm: Algorithm::Rsa3072Oaep,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: 30,
        }
    }
}
