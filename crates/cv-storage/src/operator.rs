//! OpenDAL Operator factory for the blob store backends

use anyhow::{Context, Result};
use cv_core::config::{BlobBackend, StorageConfig};
use opendal::Operator;

/// Access keys for the S3 backend. Never logged.
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Build an Operator for the configured backend.
///
/// `credentials` is only consulted for `s3`. No retry layer is installed:
/// a failed write surfaces to the caller instead of being replayed.
pub fn build_operator(
    storage: &StorageConfig,
    credentials: Option<&S3Credentials>,
) -> Result<Operator> {
    let op = match storage.backend {
        BlobBackend::Memory => Operator::new(opendal::services::Memory::default())
            .context("creating OpenDAL memory operator")?
            .layer(opendal::layers::LoggingLayer::default())
            .finish(),
        BlobBackend::Fs => {
            let root = if storage.root.is_absolute() {
                storage.root.clone()
            } else {
                std::env::current_dir()
                    .context("resolving relative storage root")?
                    .join(&storage.root)
            };
            let root = root.to_str().with_context(|| {
                format!("storage root is not valid UTF-8: {}", root.display())
            })?;
            Operator::new(opendal::services::Fs::default().root(root))
                .with_context(|| format!("creating OpenDAL fs operator at {root}"))?
                .layer(opendal::layers::LoggingLayer::default())
                .finish()
        }
        BlobBackend::S3 => {
            check_tls(storage)?;
            let creds = credentials.context(
                "S3 backend requires AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY",
            )?;
            // Path-style addressing is the opendal default, which SeaweedFS and MinIO need
            let builder = opendal::services::S3::default()
                .endpoint(&storage.endpoint)
                .region(&storage.region)
                .bucket(&storage.bucket)
                .access_key_id(&creds.access_key_id)
                .secret_access_key(&creds.secret_access_key);
            Operator::new(builder)
                .context("creating OpenDAL S3 operator")?
                .layer(opendal::layers::LoggingLayer::default())
                .finish()
        }
    };

    tracing::debug!(backend = ?storage.backend, "blob operator ready");
    Ok(op)
}

/// Reject plaintext HTTP when `enforce_tls` is set, warn otherwise.
fn check_tls(storage: &StorageConfig) -> Result<()> {
    if storage.endpoint.starts_with("http://") {
        if storage.enforce_tls {
            anyhow::bail!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                storage.endpoint
            );
        }
        tracing::warn!(
            endpoint = %storage.endpoint,
            "S3 endpoint uses plaintext HTTP; credentials and ciphertext travel unencrypted. \
             Set storage.enforce_tls = true and use HTTPS in production."
        );
    }
    Ok(())
}
