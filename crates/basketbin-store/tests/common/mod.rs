//! Shared fixtures for store integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use basketbin_store::{AccessLayer, BlobError, BlobId, BlobStore, MemoryBlobStore, StoreConfig};
use bytes::Bytes;
use sea_orm::DatabaseConnection;

/// In-memory database with migrations applied
pub async fn setup_test_db() -> DatabaseConnection {
    let db = basketbin_db::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    basketbin_db::migrate(&db)
        .await
        .expect("Failed to run migrations");

    db
}

pub async fn setup_access() -> (AccessLayer, Arc<MemoryBlobStore>) {
    let db = setup_test_db().await;
    let blobs = Arc::new(MemoryBlobStore::new());
    let access = AccessLayer::new(db, blobs.clone(), StoreConfig::default());
    (access, blobs)
}

/// Blob store whose deletes (and optionally reads) can be switched to fail
#[derive(Default)]
pub struct FlakyBlobStore {
    inner: MemoryBlobStore,
    fail_deletes: AtomicBool,
    fail_reads: AtomicBool,
}

impl FlakyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, bytes: Bytes) -> Result<BlobId, BlobError> {
        self.inner.put(bytes).await
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>, BlobError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("reads disabled".to_string()));
        }
        self.inner.get(id).await
    }

    async fn delete(&self, id: &BlobId) -> Result<bool, BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("deletes disabled".to_string()));
        }
        self.inner.delete(id).await
    }
}

/// Blob store that never answers within any reasonable deadline
pub struct StalledBlobStore;

#[async_trait]
impl BlobStore for StalledBlobStore {
    async fn put(&self, _bytes: Bytes) -> Result<BlobId, BlobError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(BlobId::new("late"))
    }

    async fn get(&self, _id: &BlobId) -> Result<Option<Bytes>, BlobError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }

    async fn delete(&self, _id: &BlobId) -> Result<bool, BlobError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(false)
    }
}
