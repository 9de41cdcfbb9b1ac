//! Silver stage over the in-memory object store
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use cnae_common::CnaeRecord;
use cnae_pipeline::parquet_io;
use cnae_pipeline::storage::{MemoryStore, ObjectStore, StorageError};
use cnae_pipeline::transformer::Transformer;
use cnae_pipeline::StageError;
use common::{cnae_zip, test_config, zip_with_entry, SAMPLE_ROWS};
use std::sync::Arc;
use tempfile::TempDir;

async fn store_with_raw(archive: Vec<u8>) -> MemoryStore {
    let store = MemoryStore::new().with_bucket("raw-data");
    store
        .put_object("raw-data", "Cnaes.zip", archive, None)
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_transform_writes_typed_parquet() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), "http://unused");
    let store = store_with_raw(cnae_zip(SAMPLE_ROWS)).await;

    let outcome = Transformer::new(&config, Arc::new(store.clone()))
        .transform()
        .await
        .unwrap();

    assert_eq!(outcome.rows, 2);
    assert_eq!(outcome.sample, Some(CnaeRecord::new("0111301", "Cultivo de arroz")));
    assert_eq!(outcome.artifact.to_string(), "s3://silver-data/cnaes.parquet");

    let uploaded = store.object("silver-data", "cnaes.parquet").unwrap();
    assert_eq!(std::fs::read(&config.transform.processed_path).unwrap(), uploaded);

    let records = parquet_io::decode(uploaded).unwrap();
    assert_eq!(records[0].codigo_cnae, "0111301");
    assert_eq!(
        records[1],
        CnaeRecord::new(
            "6201501",
            "Desenvolvimento de programas de computador sob encomenda"
        )
    );
}

#[tokio::test]
async fn test_transform_decodes_accents() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), "http://unused");
    let store = store_with_raw(cnae_zip(&[("1011201", "Frigorífico - abate de bovinos")])).await;

    Transformer::new(&config, Arc::new(store.clone()))
        .transform()
        .await
        .unwrap();

    let records = parquet_io::decode(store.object("silver-data", "cnaes.parquet").unwrap()).unwrap();
    assert_eq!(
        records[0].descricao_cnae.as_deref(),
        Some("Frigorífico - abate de bovinos")
    );
}

#[tokio::test]
async fn test_transform_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), "http://unused");
    let store = store_with_raw(cnae_zip(SAMPLE_ROWS)).await;
    let transformer = Transformer::new(&config, Arc::new(store.clone()));

    transformer.transform().await.unwrap();
    let first = store.object("silver-data", "cnaes.parquet").unwrap();
    transformer.transform().await.unwrap();
    let second = store.object("silver-data", "cnaes.parquet").unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_raw_object_fails() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), "http://unused");
    let store = MemoryStore::new().with_bucket("raw-data");

    let err = Transformer::new(&config, Arc::new(store.clone()))
        .transform()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StageError::Storage(StorageError::NoSuchKey { .. })
    ));
    assert!(store.object("silver-data", "cnaes.parquet").is_none());
}

#[tokio::test]
async fn test_malformed_rows_publish_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), "http://unused");
    let archive = zip_with_entry("Cnaes.csv", b"\"0111301\";\"a\";\"extra\"\r\n");
    let store = store_with_raw(archive).await;

    let err = Transformer::new(&config, Arc::new(store.clone()))
        .transform()
        .await
        .unwrap_err();

    assert!(matches!(err, StageError::Parse(_)));
    assert!(store.object("silver-data", "cnaes.parquet").is_none());
    assert!(!config.transform.processed_path.exists());
}
