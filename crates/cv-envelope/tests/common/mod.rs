#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cv_core::{Algorithm, DocumentRecord, VaultError, VaultResult};
use cv_crypto::{CryptoProvider, SystemCrypto};
use cv_envelope::EnvelopeEngine;
use cv_storage::{BlobStore, Catalog, DocumentStore, OpendalBlobStore};
use opendal::Operator;
use uuid::Uuid;

/// Blob store over a plain map, so tests can inspect and corrupt blobs.
#[derive(Default)]
pub struct MemoryBlobs {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobs {
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(handle)
    }

    pub fn tamper(&self, handle: &str, f: impl FnOnce(&mut Vec<u8>)) {
        let mut blobs = self.blobs.lock().unwrap();
        f(blobs.get_mut(handle).expect("blob present"));
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn save(&self, bytes: &[u8]) -> VaultResult<String> {
        let handle = format!("{}.enc", Uuid::new_v4());
        self.blobs
            .lock()
            .unwrap()
            .insert(handle.clone(), bytes.to_vec());
        Ok(handle)
    }

    async fn load(&self, handle: &str) -> VaultResult<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("blob {handle}")))
    }

    async fn delete(&self, handle: &str) -> VaultResult<()> {
        self.blobs.lock().unwrap().remove(handle);
        Ok(())
    }
}

/// Document store whose writes always fail.
pub struct FailingDocuments;

#[async_trait]
impl DocumentStore for FailingDocuments {
    async fn save(&self, _record: &DocumentRecord) -> VaultResult<()> {
        Err(VaultError::Storage("record store unavailable".into()))
    }

    async fn find_by_id(&self, _id: Uuid) -> VaultResult<Option<DocumentRecord>> {
        Ok(None)
    }

    async fn find_by_key(&self, _key_id: Uuid) -> VaultResult<Vec<DocumentRecord>> {
        Ok(Vec::new())
    }

    async fn delete(&self, id: Uuid) -> VaultResult<()> {
        Err(VaultError::NotFound(format!("document {id}")))
    }
}

/// Document store whose writes never complete.
pub struct StalledDocuments;

#[async_trait]
impl DocumentStore for StalledDocuments {
    async fn save(&self, _record: &DocumentRecord) -> VaultResult<()> {
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn find_by_id(&self, _id: Uuid) -> VaultResult<Option<DocumentRecord>> {
        Ok(None)
    }

    async fn find_by_key(&self, _key_id: Uuid) -> VaultResult<Vec<DocumentRecord>> {
        Ok(Vec::new())
    }

    async fn delete(&self, id: Uuid) -> VaultResult<()> {
        Err(VaultError::NotFound(format!("document {id}")))
    }
}

pub struct Harness {
    pub engine: EnvelopeEngine,
    pub catalog: Arc<Catalog>,
    pub blobs: Arc<MemoryBlobs>,
}

/// Engine over an in-memory catalog and [`MemoryBlobs`].
pub fn harness() -> Harness {
    harness_with(Arc::new(SystemCrypto), None)
}

/// Like [`harness`], with a custom provider and optionally a custom
/// document store in place of the catalog.
pub fn harness_with(
    crypto: Arc<dyn CryptoProvider>,
    documents: Option<Arc<dyn DocumentStore>>,
) -> Harness {
    let catalog = Arc::new(Catalog::in_memory());
    let blobs = Arc::new(MemoryBlobs::default());
    let documents = documents.unwrap_or_else(|| catalog.clone() as Arc<dyn DocumentStore>);
    let engine = EnvelopeEngine::new(crypto, catalog.clone(), documents, blobs.clone());
    Harness {
        engine,
        catalog,
        blobs,
    }
}

/// Engine over an in-memory catalog and the OpenDAL memory backend.
pub fn opendal_engine() -> EnvelopeEngine {
    let op = Operator::new(opendal::services::Memory::default())
        .expect("memory operator")
        .finish();
    let catalog = Arc::new(Catalog::in_memory());
    EnvelopeEngine::new(
        Arc::new(SystemCrypto),
        catalog.clone(),
        catalog,
        Arc::new(OpendalBlobStore::new(op, "documents")),
    )
}

pub async fn rsa_2048(engine: &EnvelopeEngine, owner: &str) -> Uuid {
    engine
        .generate_key_pair(owner, Algorithm::Rsa2048Oaep)
        .await
        .expect("generate RSA-2048 key pair")
        .id
}
