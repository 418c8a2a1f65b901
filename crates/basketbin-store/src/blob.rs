//! Out-of-line storage for request bodies
//!
//! The relational store only keeps an opaque [`BlobId`] per request. The
//! body bytes live behind the [`BlobStore`] trait so deployments can plug
//! in whatever document or object store they run.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

/// Opaque reference to a stored body
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for BlobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone)]
pub enum BlobError {
    #[error("Blob store unavailable: {0}")]
    Unavailable(String),

    #[error("Blob store call {0} timed out")]
    Timeout(&'static str),

    #[error("Blob store error: {0}")]
    Backend(String),
}

/// Key/value content store for request bodies
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return the id they can be fetched with
    async fn put(&self, bytes: Bytes) -> Result<BlobId, BlobError>;

    /// Fetch bytes; `Ok(None)` if the id is unknown
    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>, BlobError>;

    /// Remove bytes; returns whether the id existed
    async fn delete(&self, id: &BlobId) -> Result<bool, BlobError>;
}

/// In-process blob store backed by a concurrent map
///
/// Bodies do not survive a restart. Suitable for tests and single-node
/// deployments that accept losing bodies on restart.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<BlobId, Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn contains(&self, id: &BlobId) -> bool {
        self.blobs.contains_key(id)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Bytes) -> Result<BlobId, BlobError> {
        let id = BlobId(Uuid::new_v4().simple().to_string());
        self.blobs.insert(id.clone(), bytes);
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>, BlobError> {
        Ok(self.blobs.get(id).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, id: &BlobId) -> Result<bool, BlobError> {
        Ok(self.blobs.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_blob_lifecycle() {
        let store = MemoryBlobStore::new();
        assert!(store.is_empty());

        let id = store.put(Bytes::from_static(b"{\"x\":1}")).await.unwrap();
        assert!(store.contains(&id));
        assert_eq!(
            store.get(&id).await.unwrap(),
            Some(Bytes::from_static(b"{\"x\":1}"))
        );

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_blob_ids_are_distinct() {
        let store = MemoryBlobStore::new();
        let a = store.put(Bytes::from_static(b"same")).await.unwrap();
        let b = store.put(Bytes::from_static(b"same")).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }
}
