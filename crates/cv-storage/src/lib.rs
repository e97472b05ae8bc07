//! cv-storage: ciphertext blobs over OpenDAL, key and document records in a catalog

pub mod blob;
pub mod catalog;
pub mod operator;

pub use blob::{BlobStore, OpendalBlobStore};
pub use catalog::{Catalog, DocumentStore, KeyStore};
pub use operator::{build_operator, S3Credentials};
