//! Docket Core Library
//!
//! This crate provides the document model, error types and configuration
//! shared across all docket components.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    BaseConfig, Config, DocketConfig, EventBusBackend, EventBusConfig, ProcessingFlags,
    RepositoryBackend, RepositoryConfig, StorageConfig, UploadPolicy, WorkerConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
// Note: Storage, StorageError, StorageResult live in docket-storage
