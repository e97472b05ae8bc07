//! Key record lifecycle: generation, lookup, statistics, guarded deletion

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use cv_core::{Algorithm, KeyKind, KeyRecord};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::EnvelopeEngine;
use crate::error::{EnvelopeError, EnvelopeResult};

/// Per-owner key inventory with the documents each key protects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStats {
    pub owner: String,
    pub total_keys: usize,
    pub symmetric_keys: usize,
    pub asymmetric_keys: usize,
    pub total_documents: usize,
    pub keys: Vec<KeyUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyUsage {
    pub id: Uuid,
    pub kind: KeyKind,
    pub algorithm: Algorithm,
    pub documents: Vec<Uuid>,
    pub created_at: u64,
}

fn require_owner(owner: &str) -> EnvelopeResult<()> {
    if owner.trim().is_empty() {
        return Err(EnvelopeError::InvalidInput("owner must not be empty".into()));
    }
    Ok(())
}

impl EnvelopeEngine {
    /// Create and store a fresh AES-256 key for `owner`.
    pub async fn generate_symmetric_key(&self, owner: &str) -> EnvelopeResult<KeyRecord> {
        require_owner(owner)?;
        let key = self.crypto.generate_session_key()?;
        let record = KeyRecord::symmetric(owner, B64.encode(key.as_bytes()));
        self.keys.save(&record).await?;
        info!(key_id = %record.id, owner, algorithm = %record.algorithm, "key generated");
        Ok(record)
    }

    /// Create and store an RSA key pair for `owner`.
    ///
    /// Generation runs on the blocking pool; a 3072-bit pair takes long
    /// enough to stall other tasks on the runtime.
    pub async fn generate_key_pair(
        &self,
        owner: &str,
        algorithm: Algorithm,
    ) -> EnvelopeResult<KeyRecord> {
        require_owner(owner)?;
        let bits = algorithm.rsa_bits().ok_or_else(|| {
            EnvelopeError::InvalidInput(format!("{algorithm} is not an asymmetric algorithm"))
        })?;

        let crypto = Arc::clone(&self.crypto);
        let pair = tokio::task::spawn_blocking(move || crypto.generate_key_pair(bits))
            .await
            .map_err(|e| {
                EnvelopeError::AlgorithmUnavailable(format!("key generation task: {e}"))
            })??;

        let private = B64.encode(pair.private_der()?.as_slice());
        let public = B64.encode(pair.public_der()?);

        let record = KeyRecord::asymmetric(owner, algorithm, private, public);
        self.keys.save(&record).await?;
        info!(key_id = %record.id, owner, %algorithm, "key pair generated");
        Ok(record)
    }

    /// Keys owned by `owner`, oldest first.
    pub async fn list_keys(&self, owner: &str) -> EnvelopeResult<Vec<KeyRecord>> {
        Ok(self.keys.find_by_owner(owner).await?)
    }

    /// Key `id` as seen by `owner`. Another owner's key is `NotFound`,
    /// indistinguishable from a key that does not exist.
    pub async fn get_key(&self, id: Uuid, owner: &str) -> EnvelopeResult<KeyRecord> {
        match self.keys.find_by_id(id).await? {
            Some(record) if record.owner == owner => Ok(record),
            _ => Err(EnvelopeError::NotFound(format!("key {id} for owner {owner}"))),
        }
    }

    /// Delete `owner`'s key `id`. Refused with `KeyInUse` while any
    /// document references it.
    pub async fn delete_key(&self, id: Uuid, owner: &str) -> EnvelopeResult<()> {
        let _exclusive = self.key_guard.write().await;

        self.get_key(id, owner).await?;
        if self.keys.exists_referencing_documents(id).await? {
            let documents = self.documents.find_by_key(id).await?.len();
            return Err(EnvelopeError::KeyInUse {
                key_id: id,
                documents,
            });
        }

        self.keys.delete(id).await?;
        info!(key_id = %id, owner, "key deleted");
        Ok(())
    }

    pub async fn key_statistics(&self, owner: &str) -> EnvelopeResult<KeyStats> {
        let records = self.keys.find_by_owner(owner).await?;

        let mut keys = Vec::with_capacity(records.len());
        for record in &records {
            let documents = self
                .documents
                .find_by_key(record.id)
                .await?
                .into_iter()
                .map(|d| d.id)
                .collect();
            keys.push(KeyUsage {
                id: record.id,
                kind: record.kind,
                algorithm: record.algorithm,
                documents,
                created_at: record.created_at,
            });
        }

        let symmetric_keys = keys
            .iter()
            .filter(|k| k.kind == KeyKind::Symmetric)
            .count();
        Ok(KeyStats {
            owner: owner.to_string(),
            total_keys: keys.len(),
            symmetric_keys,
            asymmetric_keys: keys.len() - symmetric_keys,
            total_documents: keys.iter().map(|k| k.documents.len()).sum(),
            keys,
        })
    }
}
