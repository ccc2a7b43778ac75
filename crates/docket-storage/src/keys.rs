//! Shared key and URI derivation for storage backends.
//!
//! Key format: `documents/{yyyy}/{MM}/{document_id}.{ext}`, URI format: `{scheme}://{bucket}/{key}`.

use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};
use crate::StorageBackend;

const KEY_PREFIX: &str = "documents";

/// Lowercased extension of `file_name`, if it has one.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Storage key for a document.
///
/// Derived only from the document id, its upload time and its file name, so the same
/// document always maps to the same key.
pub fn document_key(document_id: Uuid, uploaded_at: DateTime<Utc>, file_name: &str) -> String {
    let base = format!(
        "{}/{:04}/{:02}/{}",
        KEY_PREFIX,
        uploaded_at.year(),
        uploaded_at.month(),
        document_id
    );
    match file_extension(file_name) {
        Some(ext) => format!("{}.{}", base, ext),
        None => base,
    }
}

/// Reject keys that are empty or could escape a storage root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') || storage_key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

pub fn storage_uri(backend: StorageBackend, bucket: &str, storage_key: &str) -> String {
    format!("{}://{}/{}", backend.scheme(), bucket, storage_key)
}

/// Split a storage URI into `(scheme, bucket, key)`.
pub fn parse_storage_uri(uri: &str) -> StorageResult<(String, String, String)> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| StorageError::InvalidKey(format!("Malformed storage URI: {}", uri)))?;
    let (bucket, key) = rest
        .split_once('/')
        .ok_or_else(|| StorageError::InvalidKey(format!("Storage URI has no key: {}", uri)))?;
    if scheme.is_empty() || bucket.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "Malformed storage URI: {}",
            uri
        )));
    }
    validate_key(key)?;
    Ok((scheme.to_string(), bucket.to_string(), key.to_string()))
}
