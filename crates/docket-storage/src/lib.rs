//! Docket Storage Library
//!
//! This crate provides the storage abstraction for uploaded document bytes and its
//! implementations for the local filesystem and `object_store` backends (GCS, S3, in-memory).
//!
//! # Storage key format
//!
//! Every backend stores a document under `documents/{yyyy}/{MM}/{document_id}.{ext}` and
//! reports it as the URI `{scheme}://{bucket}/{key}`. Keys must not contain `..` or a
//! leading `/`. Key and URI derivation is centralized in the `keys` module.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-object")]
pub mod object;
pub mod traits;

// Re-export commonly used types
pub use docket_core::StorageBackend;
pub use factory::create_storage;
pub use keys::{document_key, parse_storage_uri, storage_uri};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-object")]
pub use object::ObjectStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
