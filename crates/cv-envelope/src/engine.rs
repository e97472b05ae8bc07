//! Envelope workflow: encrypt and decrypt documents
//!
//! Encryption runs these stages in order, and a document record exists only
//! if all of them succeed:
//!   - `Hashed`: SHA-256 of the plaintext
//!   - `KeyGenerated`: fresh one-time session key
//!   - `Encrypted`: AES-256-GCM with a fresh IV
//!   - `Wrapped`: session key under the recipient's RSA public key
//!   - `BlobStored`: ciphertext written to the blob store
//!   - `RecordPersisted`: document record written
//!
//! A blob written without a following record is removed again, whether the
//! record write failed or the whole future was dropped.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use cv_core::config::EngineConfig;
use cv_core::types::unix_now;
use cv_core::{DocumentRecord, KeyKind, KeyRecord};
use cv_crypto::{
    decode_private_key, decode_public_key, digest_matches, sha256, sha256_hex, CryptoProvider,
};
use cv_crypto::{RsaPrivateKey, RsaPublicKey, SessionKey};
use cv_storage::{BlobStore, DocumentStore, KeyStore};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::{EnvelopeError, EnvelopeResult};

/// Progress of a single encrypt call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptStage {
    Received,
    Hashed,
    KeyGenerated,
    Encrypted,
    Wrapped,
    BlobStored,
    RecordPersisted,
}

impl fmt::Display for EncryptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EncryptStage::Received => "received",
            EncryptStage::Hashed => "hashed",
            EncryptStage::KeyGenerated => "key_generated",
            EncryptStage::Encrypted => "encrypted",
            EncryptStage::Wrapped => "wrapped",
            EncryptStage::BlobStored => "blob_stored",
            EncryptStage::RecordPersisted => "record_persisted",
        };
        f.write_str(s)
    }
}

fn advance(stage: &mut EncryptStage, next: EncryptStage, key_id: Uuid) {
    *stage = next;
    debug!(%key_id, stage = %next, "encrypt stage");
}

/// Orchestrates the crypto provider and the three stores.
///
/// Shared across tasks behind an `Arc`; calls keep no state between them.
pub struct EnvelopeEngine {
    pub(crate) crypto: Arc<dyn CryptoProvider>,
    pub(crate) keys: Arc<dyn KeyStore>,
    pub(crate) documents: Arc<dyn DocumentStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    /// Encrypt holds it shared for the whole workflow, key deletion holds it
    /// exclusively across the reference check and the delete.
    pub(crate) key_guard: RwLock<()>,
    operation_timeout: Duration,
}

impl EnvelopeEngine {
    pub fn new(
        crypto: Arc<dyn CryptoProvider>,
        keys: Arc<dyn KeyStore>,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            crypto,
            keys,
            documents,
            blobs,
            key_guard: RwLock::new(()),
            operation_timeout: Duration::from_secs(EngineConfig::default().operation_timeout_secs),
        }
    }

    /// Limit applied by [`encrypt_with_timeout`](Self::encrypt_with_timeout)
    /// and [`decrypt_with_timeout`](Self::decrypt_with_timeout). Zero means
    /// no limit.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    // ── Encrypt ──────────────────────────────────────────────────────────

    /// Encrypt `plaintext` for the asymmetric key `key_id` and persist it.
    ///
    /// The plaintext buffer and the session key are wiped when this returns,
    /// on success and on every error path.
    pub async fn encrypt(
        &self,
        plaintext: impl Into<Zeroizing<Vec<u8>>>,
        key_id: Uuid,
        filename: &str,
        content_type: &str,
    ) -> EnvelopeResult<DocumentRecord> {
        let plaintext: Zeroizing<Vec<u8>> = plaintext.into();
        let _shared = self.key_guard.read().await;

        let mut stage = EncryptStage::Received;
        let result = self
            .run_encrypt(&plaintext, key_id, filename, content_type, &mut stage)
            .await;

        match &result {
            Ok(record) => info!(
                document_id = %record.id,
                %key_id,
                size = record.original_size,
                "document encrypted"
            ),
            Err(e) => warn!(%key_id, %stage, error = %e, "encryption failed"),
        }
        result
    }

    async fn run_encrypt(
        &self,
        plaintext: &[u8],
        key_id: Uuid,
        filename: &str,
        content_type: &str,
        stage: &mut EncryptStage,
    ) -> EnvelopeResult<DocumentRecord> {
        if filename.trim().is_empty() {
            return Err(EnvelopeError::InvalidInput("filename must not be empty".into()));
        }

        let key = self.load_key(key_id).await?;
        if key.kind != KeyKind::Asymmetric {
            return Err(EnvelopeError::WrongKeyKind {
                key_id,
                kind: key.kind,
            });
        }
        let public = public_key_of(&key)?;

        let digest = sha256_hex(plaintext);
        advance(stage, EncryptStage::Hashed, key_id);

        let session: SessionKey = self.crypto.generate_session_key()?;
        advance(stage, EncryptStage::KeyGenerated, key_id);

        let sealed = self.crypto.seal(&session, plaintext)?;
        advance(stage, EncryptStage::Encrypted, key_id);

        let wrapped = self.crypto.wrap_key(session.as_bytes(), &public)?;
        drop(session);
        advance(stage, EncryptStage::Wrapped, key_id);

        let handle = self.blobs.save(&sealed.ciphertext).await?;
        let pending = BlobGuard::new(Arc::clone(&self.blobs), handle.clone());
        advance(stage, EncryptStage::BlobStored, key_id);

        let record = DocumentRecord {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            original_size: plaintext.len() as u64,
            sha256: digest,
            iv: B64.encode(sealed.iv),
            tag: B64.encode(sealed.tag),
            wrapped_key: B64.encode(&wrapped),
            blob_handle: handle,
            key_id,
            created_at: unix_now(),
        };

        if let Err(e) = self.documents.save(&record).await {
            pending.remove().await;
            return Err(e.into());
        }
        pending.keep();
        advance(stage, EncryptStage::RecordPersisted, key_id);

        Ok(record)
    }

    /// [`encrypt`](Self::encrypt) bounded by the configured operation timeout.
    pub async fn encrypt_with_timeout(
        &self,
        plaintext: impl Into<Zeroizing<Vec<u8>>>,
        key_id: Uuid,
        filename: &str,
        content_type: &str,
    ) -> EnvelopeResult<DocumentRecord> {
        self.bounded(self.encrypt(plaintext, key_id, filename, content_type))
            .await
    }

    // ── Decrypt ──────────────────────────────────────────────────────────

    /// Recover the plaintext of `record` and verify it against the stored
    /// digest. The returned buffer wipes itself when dropped.
    pub async fn decrypt(&self, record: &DocumentRecord) -> EnvelopeResult<Zeroizing<Vec<u8>>> {
        let result = self.run_decrypt(record).await;
        match &result {
            Ok(_) => debug!(document_id = %record.id, "document decrypted"),
            Err(e) if e.is_security_event() => error!(
                document_id = %record.id,
                key_id = %record.key_id,
                error = %e,
                "security event: document failed verification"
            ),
            Err(e) => warn!(document_id = %record.id, error = %e, "decryption failed"),
        }
        result
    }

    async fn run_decrypt(&self, record: &DocumentRecord) -> EnvelopeResult<Zeroizing<Vec<u8>>> {
        let key = self.load_key(record.key_id).await?;
        if key.kind != KeyKind::Asymmetric {
            return Err(EnvelopeError::WrongKeyKind {
                key_id: key.id,
                kind: key.kind,
            });
        }
        let private = private_key_of(&key)?;

        let wrapped = B64
            .decode(&record.wrapped_key)
            .map_err(|_| EnvelopeError::UnwrapFailed)?;
        let raw = self.crypto.unwrap_key(&wrapped, &private)?;
        let session = SessionKey::from_slice(&raw)?;
        drop(raw);

        let ciphertext = self.blobs.load(&record.blob_handle).await?;
        let iv = decode_field("iv", &record.iv)?;
        let tag = decode_field("tag", &record.tag)?;

        let plaintext = self.crypto.open(&session, &ciphertext, &iv, &tag)?;
        drop(session);

        if !digest_matches(&sha256(&plaintext), &record.sha256) {
            return Err(EnvelopeError::IntegrityViolation {
                document_id: record.id,
            });
        }
        Ok(plaintext)
    }

    /// Look up document `id` and decrypt it.
    pub async fn decrypt_by_id(&self, id: Uuid) -> EnvelopeResult<Zeroizing<Vec<u8>>> {
        let record = self.document(id).await?;
        self.decrypt(&record).await
    }

    /// [`decrypt`](Self::decrypt) bounded by the configured operation timeout.
    pub async fn decrypt_with_timeout(
        &self,
        record: &DocumentRecord,
    ) -> EnvelopeResult<Zeroizing<Vec<u8>>> {
        self.bounded(self.decrypt(record)).await
    }

    // ── Documents ────────────────────────────────────────────────────────

    pub async fn document(&self, id: Uuid) -> EnvelopeResult<DocumentRecord> {
        self.documents
            .find_by_id(id)
            .await?
            .ok_or_else(|| EnvelopeError::NotFound(format!("document {id}")))
    }

    /// Delete the record, then its blob. A blob that cannot be removed is
    /// logged and left behind; the document is gone either way.
    pub async fn delete_document(&self, id: Uuid) -> EnvelopeResult<()> {
        let record = self.document(id).await?;
        self.documents.delete(id).await?;

        if let Err(e) = self.blobs.delete(&record.blob_handle).await {
            warn!(
                document_id = %id,
                handle = %record.blob_handle,
                error = %e,
                "document deleted but its blob could not be removed"
            );
        }
        info!(document_id = %id, "document deleted");
        Ok(())
    }

    /// Dropping `fut` on timeout runs the same cleanup as any cancellation.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = EnvelopeResult<T>>,
    ) -> EnvelopeResult<T> {
        let limit = self.operation_timeout;
        if limit.is_zero() {
            return fut.await;
        }
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| EnvelopeError::Timeout(limit))?
    }

    pub(crate) async fn load_key(&self, id: Uuid) -> EnvelopeResult<KeyRecord> {
        self.keys
            .find_by_id(id)
            .await?
            .ok_or_else(|| EnvelopeError::NotFound(format!("key {id}")))
    }
}

fn decode_field(name: &str, value: &str) -> EnvelopeResult<Vec<u8>> {
    B64.decode(value)
        .map_err(|e| EnvelopeError::CipherInit(format!("stored {name} is not base64: {e}")))
}

fn public_key_of(key: &KeyRecord) -> EnvelopeResult<RsaPublicKey> {
    let encoded = key.public_key.as_deref().ok_or_else(|| {
        EnvelopeError::InvalidKey(format!("key {} has no public key material", key.id))
    })?;
    let der = B64
        .decode(encoded)
        .map_err(|e| EnvelopeError::InvalidKey(format!("key {} public key: {e}", key.id)))?;
    Ok(decode_public_key(&der)?)
}

fn private_key_of(key: &KeyRecord) -> EnvelopeResult<RsaPrivateKey> {
    let der = Zeroizing::new(
        B64.decode(&key.key_material)
            .map_err(|e| EnvelopeError::InvalidKey(format!("key {} private key: {e}", key.id)))?,
    );
    Ok(decode_private_key(&der)?)
}

/// Removes a freshly written blob unless [`keep`](Self::keep) is called.
///
/// Dropping an armed guard (the encrypt future was cancelled) schedules the
/// delete on the current runtime.
struct BlobGuard {
    blobs: Arc<dyn BlobStore>,
    handle: Option<String>,
}

impl BlobGuard {
    fn new(blobs: Arc<dyn BlobStore>, handle: String) -> Self {
        Self {
            blobs,
            handle: Some(handle),
        }
    }

    fn keep(mut self) {
        self.handle = None;
    }

    async fn remove(mut self) {
        if let Some(handle) = self.handle.take() {
            remove_orphan(self.blobs.as_ref(), &handle).await;
        }
    }
}

impl Drop for BlobGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let blobs = Arc::clone(&self.blobs);
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move { remove_orphan(blobs.as_ref(), &handle).await });
            }
            Err(_) => warn!(handle = %handle, "no runtime to remove orphaned blob"),
        }
    }
}

async fn remove_orphan(blobs: &dyn BlobStore, handle: &str) {
    match blobs.delete(handle).await {
        Ok(()) => debug!(handle = %handle, "orphaned blob removed"),
        Err(e) => warn!(handle = %handle, error = %e, "failed to remove orphaned blob"),
    }
}
