//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::keys;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// Callers choose the key (see [`keys::document_key`]); backends return the opaque
/// storage URI that gets recorded on the document. Operations are not retried here.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `storage_key` and return its storage URI.
    async fn upload(
        &self,
        storage_key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<String>;

    /// Store the contents of `reader` under `storage_key` without buffering the whole
    /// object in memory, and return its storage URI.
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String>;

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Download a file as a stream of chunks
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Delete a file by its storage key. Deleting a missing file succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Generate a temporary URL for direct read access
    async fn get_signed_url(&self, storage_key: &str, expires_in: Duration)
        -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Bucket (or bucket-like label) that appears in storage URIs.
    fn bucket(&self) -> &str;

    /// Storage URI for a key held by this backend.
    fn uri_for(&self, storage_key: &str) -> String {
        keys::storage_uri(self.backend_type(), self.bucket(), storage_key)
    }

    /// Reverse [`Storage::uri_for`]; rejects URIs that belong to another backend or bucket.
    fn key_from_uri(&self, uri: &str) -> StorageResult<String> {
        let (scheme, bucket, key) = keys::parse_storage_uri(uri)?;
        if scheme != self.backend_type().scheme() || bucket != self.bucket() {
            return Err(StorageError::InvalidKey(format!(
                "URI '{}' does not belong to {}://{}",
                uri,
                self.backend_type().scheme(),
                self.bucket()
            )));
        }
        Ok(key)
    }
}
