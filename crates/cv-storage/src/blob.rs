//! Ciphertext blob store
//!
//! Blobs are opaque bytes addressed by a handle of the form `<uuid>.enc`.
//! The store never sees plaintext, keys, or record metadata.

use async_trait::async_trait;
use cv_core::{VaultError, VaultResult};
use opendal::Operator;
use uuid::Uuid;

/// Extension appended to every generated handle
pub const BLOB_EXTENSION: &str = "enc";

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` under a fresh handle and return it.
    async fn save(&self, bytes: &[u8]) -> VaultResult<String>;

    /// Load a blob. `NotFound` if the handle does not exist.
    async fn load(&self, handle: &str) -> VaultResult<Vec<u8>>;

    /// Delete a blob. Deleting a missing handle succeeds.
    async fn delete(&self, handle: &str) -> VaultResult<()>;
}

/// [`BlobStore`] over any OpenDAL backend.
#[derive(Clone, Debug)]
pub struct OpendalBlobStore {
    op: Operator,
    prefix: String,
}

impl OpendalBlobStore {
    pub fn new(op: Operator, prefix: impl Into<String>) -> Self {
        Self {
            op,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    fn path_for(&self, handle: &str) -> VaultResult<String> {
        validate_handle(handle)?;
        if self.prefix.is_empty() {
            Ok(handle.to_string())
        } else {
            Ok(format!("{}/{handle}", self.prefix))
        }
    }
}

/// Handles are single path components: no separators, no `..`.
pub fn validate_handle(handle: &str) -> VaultResult<()> {
    if handle.is_empty()
        || handle.contains('/')
        || handle.contains('\\')
        || handle.contains("..")
    {
        return Err(VaultError::InvalidInput(format!(
            "invalid blob handle '{handle}'"
        )));
    }
    Ok(())
}

fn storage_err(action: &str, handle: &str, e: opendal::Error) -> VaultError {
    match e.kind() {
        opendal::ErrorKind::NotFound => VaultError::NotFound(format!("blob {handle}")),
        opendal::ErrorKind::ConditionNotMatch => {
            VaultError::AlreadyExists(format!("blob {handle}"))
        }
        _ => VaultError::Storage(format!("{action} blob {handle}: {e}")),
    }
}

impl OpendalBlobStore {
    /// Write `bytes` at `path`, failing with `AlreadyExists` instead of
    /// replacing an existing blob.
    ///
    /// Backends without conditional writes fall back to a stat before the
    /// write, which narrows but does not close the race.
    async fn write_new(&self, path: &str, handle: &str, bytes: &[u8]) -> VaultResult<()> {
        let conditional = self.op.info().full_capability().write_with_if_not_exists;
        if !conditional
            && self
                .op
                .exists(path)
                .await
                .map_err(|e| storage_err("stat", handle, e))?
        {
            return Err(VaultError::AlreadyExists(format!("blob {handle}")));
        }

        self.op
            .write_with(path, bytes.to_vec())
            .if_not_exists(conditional)
            .await
            .map_err(|e| storage_err("write", handle, e))?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for OpendalBlobStore {
    async fn save(&self, bytes: &[u8]) -> VaultResult<String> {
        let handle = format!("{}.{BLOB_EXTENSION}", Uuid::new_v4());
        let path = self.path_for(&handle)?;
        self.write_new(&path, &handle, bytes).await?;
        tracing::debug!(handle = %handle, size = bytes.len(), "blob stored");
        Ok(handle)
    }

    async fn load(&self, handle: &str) -> VaultResult<Vec<u8>> {
        let path = self.path_for(handle)?;
        let buf = self
            .op
            .read(&path)
            .await
            .map_err(|e| storage_err("read", handle, e))?;
        Ok(buf.to_vec())
    }

    async fn delete(&self, handle: &str) -> VaultResult<()> {
        let path = self.path_for(handle)?;
        match self.op.delete(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => {}
            Err(e) => return Err(storage_err("delete", handle, e)),
        }
        tracing::debug!(handle = %handle, "blob deleted");
        Ok(())
    }
}
