#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-object")]
use crate::ObjectStorage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use docket_core::StorageConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.backend {
        #[cfg(feature = "storage-object")]
        StorageBackend::Gcs => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                StorageError::ConfigError("STORAGE_BUCKET not configured".to_string())
            })?;
            let storage = ObjectStorage::gcs(bucket, config.credentials_path.clone())?;
            Ok(Arc::new(storage))
        }

        #[cfg(feature = "storage-object")]
        StorageBackend::S3 => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                StorageError::ConfigError("STORAGE_BUCKET not configured".to_string())
            })?;
            let region = config.region.clone().ok_or_else(|| {
                StorageError::ConfigError("STORAGE_REGION not configured".to_string())
            })?;
            let storage = ObjectStorage::s3(bucket, region, config.endpoint.clone())?;
            Ok(Arc::new(storage))
        }

        #[cfg(feature = "storage-object")]
        StorageBackend::Memory => {
            let bucket = config.bucket.clone().unwrap_or_else(|| "memory".to_string());
            Ok(Arc::new(ObjectStorage::in_memory(bucket)))
        }

        #[cfg(not(feature = "storage-object"))]
        StorageBackend::Gcs | StorageBackend::S3 | StorageBackend::Memory => {
            Err(StorageError::ConfigError(format!(
                "{} storage backend not available (storage-object feature not enabled)",
                config.backend
            )))
        }

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let bucket = config.bucket.clone().unwrap_or_else(|| "local".to_string());
            let storage =
                LocalStorage::new(base_path, bucket, config.local_base_url.clone()).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
