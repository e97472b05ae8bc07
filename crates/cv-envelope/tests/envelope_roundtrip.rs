//! End-to-end encrypt/decrypt through the engine.

mod common;

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use cv_core::{Algorithm, KeyKind};
use cv_crypto::SeededCrypto;
use cv_envelope::{EnvelopeError, ErrorKind};
use cv_storage::{BlobStore, DocumentStore};
use uuid::Uuid;

use common::{harness, harness_with, opendal_engine, rsa_2048};

const HELLO_WORLD_SHA256: &str =
    "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

fn flip_bit(encoded: &str, index: usize) -> String {
    let mut bytes = B64.decode(encoded).unwrap();
    bytes[index] ^= 0x01;
    B64.encode(bytes)
}

#[tokio::test]
async fn hello_world_with_rsa_3072() {
    let h = harness();
    let key = h
        .engine
        .generate_key_pair("alice", Algorithm::Rsa3072Oaep)
        .await
        .unwrap();

    let record = h
        .engine
        .encrypt(b"hello world".to_vec(), key.id, "hello.txt", "text/plain")
        .await
        .unwrap();

    assert_eq!(B64.decode(&record.iv).unwrap().len(), 12);
    assert_eq!(B64.decode(&record.tag).unwrap().len(), 16);
    assert_eq!(B64.decode(&record.wrapped_key).unwrap().len(), 384);
    assert_eq!(record.sha256, HELLO_WORLD_SHA256);
    assert_eq!(record.original_size, 11);
    assert_eq!(record.key_id, key.id);
    assert!(record.blob_handle.ends_with(".enc"));

    let stored = DocumentStore::find_by_id(h.catalog.as_ref(), record.id)
        .await
        .unwrap();
    assert_eq!(stored.as_ref(), Some(&record));
    assert_eq!(h.blobs.len(), 1);

    let plaintext = h.engine.decrypt(&record).await.unwrap();
    assert_eq!(plaintext.as_slice(), b"hello world");
}

#[tokio::test]
async fn roundtrip_representative_payloads() {
    let engine = opendal_engine();
    let key_id = rsa_2048(&engine, "alice").await;

    let payloads: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![0u8],
        b"short text".to_vec(),
        (0..=255u8).cycle().take(64 * 1024 + 7).collect(),
    ];

    for payload in payloads {
        let record = engine
            .encrypt(payload.clone(), key_id, "payload.bin", "application/octet-stream")
            .await
            .unwrap();
        assert_eq!(record.original_size, payload.len() as u64);

        let plaintext = engine.decrypt_by_id(record.id).await.unwrap();
        assert_eq!(plaintext.as_slice(), payload.as_slice());
    }
}

#[tokio::test]
async fn same_plaintext_twice_differs() {
    let h = harness();
    let key_id = rsa_2048(&h.engine, "alice").await;

    let a = h
        .engine
        .encrypt(b"repeat".to_vec(), key_id, "a.txt", "text/plain")
        .await
        .unwrap();
    let b = h
        .engine
        .encrypt(b"repeat".to_vec(), key_id, "b.txt", "text/plain")
        .await
        .unwrap();

    assert_ne!(a.iv, b.iv);
    assert_ne!(a.wrapped_key, b.wrapped_key);
    assert_ne!(a.blob_handle, b.blob_handle);
    assert_eq!(a.sha256, b.sha256);
}

#[tokio::test]
async fn seeded_provider_reproduces_ciphertext() {
    let mut records = Vec::new();
    for _ in 0..2 {
        let h = harness_with(Arc::new(SeededCrypto::new(42)), None);
        let key_id = rsa_2048(&h.engine, "alice").await;
        let record = h
            .engine
            .encrypt(b"test vector".to_vec(), key_id, "v.txt", "text/plain")
            .await
            .unwrap();
        records.push(record);
    }

    assert_eq!(records[0].iv, records[1].iv);
    assert_eq!(records[0].tag, records[1].tag);
    assert_eq!(records[0].wrapped_key, records[1].wrapped_key);
}

#[tokio::test]
async fn tampered_ciphertext_fails_authentication() {
    let h = harness();
    let key_id = rsa_2048(&h.engine, "alice").await;
    let record = h
        .engine
        .encrypt(b"do not touch".to_vec(), key_id, "t.txt", "text/plain")
        .await
        .unwrap();

    for index in [0usize, 5, 11] {
        h.blobs.tamper(&record.blob_handle, |ct| ct[index] ^= 0x80);
        let err = h.engine.decrypt(&record).await.unwrap_err();
        assert!(
            matches!(err, EnvelopeError::AuthenticationFailed),
            "byte {index}: {err:?}"
        );
        assert_eq!(err.kind(), ErrorKind::Security);
        h.blobs.tamper(&record.blob_handle, |ct| ct[index] ^= 0x80);
    }

    assert!(h.engine.decrypt(&record).await.is_ok());
}

#[tokio::test]
async fn tampered_iv_or_tag_fails_authentication() {
    let h = harness();
    let key_id = rsa_2048(&h.engine, "alice").await;
    let record = h
        .engine
        .encrypt(b"do not touch".to_vec(), key_id, "t.txt", "text/plain")
        .await
        .unwrap();

    for index in [0usize, 11] {
        let mut bad_iv = record.clone();
        bad_iv.iv = flip_bit(&record.iv, index);
        assert!(matches!(
            h.engine.decrypt(&bad_iv).await,
            Err(EnvelopeError::AuthenticationFailed)
        ));
    }

    for index in [0usize, 15] {
        let mut bad_tag = record.clone();
        bad_tag.tag = flip_bit(&record.tag, index);
        assert!(matches!(
            h.engine.decrypt(&bad_tag).await,
            Err(EnvelopeError::AuthenticationFailed)
        ));
    }
}

#[tokio::test]
async fn malformed_iv_length_is_cipher_init() {
    let h = harness();
    let key_id = rsa_2048(&h.engine, "alice").await;
    let mut record = h
        .engine
        .encrypt(b"abc".to_vec(), key_id, "t.txt", "text/plain")
        .await
        .unwrap();

    record.iv = B64.encode([0u8; 8]);
    let err = h.engine.decrypt(&record).await.unwrap_err();
    assert!(matches!(err, EnvelopeError::CipherInit(_)), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::Environment);
}

#[tokio::test]
async fn altered_digest_is_integrity_violation() {
    let h = harness();
    let key_id = rsa_2048(&h.engine, "alice").await;
    let mut record = h
        .engine
        .encrypt(b"hello world".to_vec(), key_id, "hello.txt", "text/plain")
        .await
        .unwrap();

    record.sha256 = "0".repeat(64);
    let err = h.engine.decrypt(&record).await.unwrap_err();
    assert!(
        matches!(err, EnvelopeError::IntegrityViolation { document_id } if document_id == record.id)
    );
    assert!(err.is_security_event());
}

#[tokio::test]
async fn corrupted_wrapped_key_is_unwrap_failed() {
    let h = harness();
    let key_id = rsa_2048(&h.engine, "alice").await;
    let mut record = h
        .engine
        .encrypt(b"abc".to_vec(), key_id, "t.txt", "text/plain")
        .await
        .unwrap();

    record.wrapped_key = flip_bit(&record.wrapped_key, 100);
    assert!(matches!(
        h.engine.decrypt(&record).await,
        Err(EnvelopeError::UnwrapFailed)
    ));

    record.wrapped_key = "%%%".into();
    assert!(matches!(
        h.engine.decrypt(&record).await,
        Err(EnvelopeError::UnwrapFailed)
    ));
}

#[tokio::test]
async fn symmetric_key_is_rejected_without_writes() {
    let h = harness();
    let key = h.engine.generate_symmetric_key("alice").await.unwrap();
    assert_eq!(key.kind, KeyKind::Symmetric);

    let err = h
        .engine
        .encrypt(b"secret".to_vec(), key.id, "s.txt", "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EnvelopeError::WrongKeyKind { key_id, kind: KeyKind::Symmetric } if key_id == key.id
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(h.blobs.len(), 0);
    assert!(h.catalog.find_by_key(key.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_key_document_and_blob_are_not_found() {
    let h = harness();

    let err = h
        .engine
        .encrypt(b"x".to_vec(), Uuid::new_v4(), "x.txt", "text/plain")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.engine.decrypt_by_id(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let key_id = rsa_2048(&h.engine, "alice").await;
    let record = h
        .engine
        .encrypt(b"x".to_vec(), key_id, "x.txt", "text/plain")
        .await
        .unwrap();
    BlobStore::delete(h.blobs.as_ref(), &record.blob_handle)
        .await
        .unwrap();
    let err = h.engine.decrypt(&record).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn empty_filename_is_invalid_input() {
    let h = harness();
    let key_id = rsa_2048(&h.engine, "alice").await;
    let err = h
        .engine
        .encrypt(b"x".to_vec(), key_id, "  ", "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, EnvelopeError::InvalidInput(_)));
    assert_eq!(h.blobs.len(), 0);
}

#[tokio::test]
async fn delete_document_removes_record_and_blob() {
    let h = harness();
    let key_id = rsa_2048(&h.engine, "alice").await;
    let record = h
        .engine
        .encrypt(b"bye".to_vec(), key_id, "bye.txt", "text/plain")
        .await
        .unwrap();

    assert_eq!(h.engine.document(record.id).await.unwrap(), record);
    h.engine.delete_document(record.id).await.unwrap();

    assert!(!h.blobs.contains(&record.blob_handle));
    assert_eq!(
        h.engine.document(record.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        h.engine.delete_document(record.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn timeout_wrappers_pass_through_when_fast() {
    let h = harness();
    let engine = h.engine.with_operation_timeout(Duration::from_secs(30));
    let key_id = rsa_2048(&engine, "alice").await;

    let record = engine
        .encrypt_with_timeout(b"in time".to_vec(), key_id, "t.txt", "text/plain")
        .await
        .unwrap();
    let plaintext = engine.decrypt_with_timeout(&record).await.unwrap();
    assert_eq!(plaintext.as_slice(), b"in time");
}
