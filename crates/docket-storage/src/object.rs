use crate::keys::validate_key;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Storage backed by an `object_store` implementation (GCS, S3 or in-memory).
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn object_store::ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    backend: StorageBackend,
    bucket: String,
}

impl ObjectStorage {
    /// Google Cloud Storage bucket.
    ///
    /// Credentials come from `credentials_path` when given, otherwise from the
    /// environment the way the GCS client normally discovers them.
    pub fn gcs(bucket: String, credentials_path: Option<String>) -> StorageResult<Self> {
        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket.clone());
        if let Some(path) = credentials_path {
            builder = builder.with_service_account_path(path);
        }

        let store = Arc::new(
            builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?,
        );

        Ok(ObjectStorage {
            signer: Some(store.clone() as Arc<dyn Signer>),
            store,
            backend: StorageBackend::Gcs,
            bucket,
        })
    }

    /// S3 bucket, or an S3-compatible provider when `endpoint_url` is set
    /// (e.g. "http://localhost:9000" for MinIO).
    pub fn s3(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = Arc::new(
            builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?,
        );

        Ok(ObjectStorage {
            signer: Some(store.clone() as Arc<dyn Signer>),
            store,
            backend: StorageBackend::S3,
            bucket,
        })
    }

    /// Process-local store; contents vanish with the process.
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        ObjectStorage {
            store: Arc::new(InMemory::new()),
            signer: None,
            backend: StorageBackend::Memory,
            bucket: bucket.into(),
        }
    }

    fn location(storage_key: &str) -> StorageResult<Path> {
        validate_key(storage_key)?;
        Path::parse(storage_key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn upload(
        &self,
        storage_key: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<String> {
        let location = Self::location(storage_key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object storage upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            backend = %self.backend,
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage upload successful"
        );

        Ok(self.uri_for(storage_key))
    }

    async fn upload_stream(
        &self,
        storage_key: &str,
        _content_type: &str,
        _content_length: Option<u64>,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<String> {
        let location = Self::location(storage_key)?;
        let start = std::time::Instant::now();

        // Small objects become a single put, larger ones a multipart upload.
        let mut writer = BufWriter::new(self.store.clone(), location);

        let copied = tokio::io::copy(&mut reader, &mut writer).await;
        let size = match copied {
            Ok(size) => size,
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(
                        error = %abort_err,
                        key = %storage_key,
                        "Failed to abort multipart upload"
                    );
                }
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage stream upload failed"
                );
                return Err(StorageError::UploadFailed(format!(
                    "Failed to read from stream: {}",
                    e
                )));
            }
        };

        writer.shutdown().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object storage stream upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            backend = %self.backend,
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage stream upload successful"
        );

        Ok(self.uri_for(storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let location = Self::location(storage_key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage download successful"
        );

        Ok(bytes.to_vec())
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let location = Self::location(storage_key)?;

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bucket = self.bucket.clone();
        let key = storage_key.to_string();
        let stream = result.into_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(
                    bucket = %bucket,
                    key = %key,
                    error = %e,
                    "Object storage stream download error"
                );
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let location = Self::location(storage_key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = Self::location(storage_key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn get_signed_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let location = Self::location(storage_key)?;
        let signer = self.signer.as_ref().ok_or_else(|| {
            StorageError::ConfigError(format!(
                "Signed URLs are not supported by the {} storage backend",
                self.backend
            ))
        })?;

        let url_result: ObjectResult<_> =
            signer.signed_url(Method::GET, &location, expires_in).await;

        Ok(url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string())
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
