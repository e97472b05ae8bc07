//! Key and document records
//!
//! [`Catalog`] keeps both record kinds in memory and, when opened on a path,
//! writes every change through to a JSON file. Writes go to a temp file
//! that is then renamed over the catalog, so a crash never leaves a
//! half-written file behind. A change that fails to persist is not applied
//! in memory either.
//!
//! Records are create-only: `save` on an id that is already present fails
//! with `AlreadyExists`. File writes run on the blocking pool while the
//! catalog lock is held, so writers are serialized but runtime workers are
//! never stalled on disk I/O.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cv_core::{DocumentRecord, KeyRecord, VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> VaultResult<Option<KeyRecord>>;

    /// All keys owned by `owner`, oldest first.
    async fn find_by_owner(&self, owner: &str) -> VaultResult<Vec<KeyRecord>>;

    /// Insert a new key record. `AlreadyExists` if the id is taken.
    async fn save(&self, record: &KeyRecord) -> VaultResult<()>;

    /// Remove a key record. `NotFound` if absent.
    async fn delete(&self, id: Uuid) -> VaultResult<()>;

    /// Whether any document record references key `id`.
    async fn exists_referencing_documents(&self, id: Uuid) -> VaultResult<bool>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document record. `AlreadyExists` if the id is taken.
    async fn save(&self, record: &DocumentRecord) -> VaultResult<()>;

    async fn find_by_id(&self, id: Uuid) -> VaultResult<Option<DocumentRecord>>;

    /// All documents encrypted for key `key_id`, oldest first.
    async fn find_by_key(&self, key_id: Uuid) -> VaultResult<Vec<DocumentRecord>>;

    /// Remove a document record. `NotFound` if absent.
    async fn delete(&self, id: Uuid) -> VaultResult<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogData {
    #[serde(default)]
    keys: BTreeMap<Uuid, KeyRecord>,
    #[serde(default)]
    documents: BTreeMap<Uuid, DocumentRecord>,
}

/// In-memory catalog, optionally persisted to a JSON file
pub struct Catalog {
    /// `None` keeps everything in memory
    path: Option<PathBuf>,
    data: Mutex<CatalogData>,
}

impl Catalog {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(CatalogData::default()),
        }
    }

    /// Load the catalog at `path`, or start empty if the file doesn't exist.
    pub fn open(path: &Path) -> VaultResult<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            CatalogData::default()
        };

        tracing::debug!(
            path = %path.display(),
            keys = data.keys.len(),
            documents = data.documents.len(),
            "catalog opened"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            data: Mutex::new(data),
        })
    }

    /// Apply `change` to a copy, persist the copy, then swap it in.
    async fn update<T>(
        &self,
        change: impl FnOnce(&mut CatalogData) -> VaultResult<T>,
    ) -> VaultResult<T> {
        let mut guard = self.data.lock().await;
        let mut next = guard.clone();
        let out = change(&mut next)?;
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&next)?;
            let path = path.clone();
            tokio::task::spawn_blocking(move || flush(&path, &json))
                .await
                .map_err(|e| VaultError::Storage(format!("catalog flush task: {e}")))??;
        }
        *guard = next;
        Ok(out)
    }
}

fn flush(path: &Path, json: &str) -> VaultResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn oldest_first<T>(mut records: Vec<T>, created_at: impl Fn(&T) -> u64) -> Vec<T> {
    records.sort_by_key(created_at);
    records
}

#[async_trait]
impl KeyStore for Catalog {
    async fn find_by_id(&self, id: Uuid) -> VaultResult<Option<KeyRecord>> {
        Ok(self.data.lock().await.keys.get(&id).cloned())
    }

    async fn find_by_owner(&self, owner: &str) -> VaultResult<Vec<KeyRecord>> {
        let keys: Vec<KeyRecord> = self
            .data
            .lock()
            .await
            .keys
            .values()
            .filter(|k| k.owner == owner)
            .cloned()
            .collect();
        Ok(oldest_first(keys, |k| k.created_at))
    }

    async fn save(&self, record: &KeyRecord) -> VaultResult<()> {
        record.validate()?;
        self.update(|data| {
            if data.keys.contains_key(&record.id) {
                return Err(VaultError::AlreadyExists(format!("key {}", record.id)));
            }
            data.keys.insert(record.id, record.clone());
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> VaultResult<()> {
        self.update(|data| match data.keys.remove(&id) {
            Some(_) => Ok(()),
            None => Err(VaultError::NotFound(format!("key {id}"))),
        })
        .await
    }

    async fn exists_referencing_documents(&self, id: Uuid) -> VaultResult<bool> {
        Ok(self
            .data
            .lock()
            .await
            .documents
            .values()
            .any(|d| d.key_id == id))
    }
}

#[async_trait]
impl DocumentStore for Catalog {
    async fn save(&self, record: &DocumentRecord) -> VaultResult<()> {
        self.update(|data| {
            if data.documents.contains_key(&record.id) {
                return Err(VaultError::AlreadyExists(format!(
                    "document {}",
                    record.id
                )));
            }
            data.documents.insert(record.id, record.clone());
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> VaultResult<Option<DocumentRecord>> {
        Ok(self.data.lock().await.documents.get(&id).cloned())
    }

    async fn find_by_key(&self, key_id: Uuid) -> VaultResult<Vec<DocumentRecord>> {
        let docs: Vec<DocumentRecord> = self
            .data
            .lock()
            .await
            .documents
            .values()
            .filter(|d| d.key_id == key_id)
            .cloned()
            .collect();
        Ok(oldest_first(docs, |d| d.created_at))
    }

    async fn delete(&self, id: Uuid) -> VaultResult<()> {
        self.update(|data| match data.documents.remove(&id) {
            Some(_) => Ok(()),
            None => Err(VaultError::NotFound(format!("document {id}"))),
        })
        .await
    }
}
