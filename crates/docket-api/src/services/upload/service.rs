//! Upload orchestrator
//!
//! Batch pipeline: validate every file → (per file) create → store bytes → persist → publish.
//!
//! Validation covers the whole batch before the first side effect, so a bad file anywhere
//! leaves storage, the repository and the bus untouched. Once storing starts, each file is
//! committed on its own; a later failure stops the batch but leaves earlier files in place
//! and in the pipeline.

use std::sync::Arc;

use docket_core::models::{Document, DocumentChangedEvent, NewDocument};
use docket_core::{AppError, UploadPolicy};
use docket_db::DocumentRepository;
use docket_storage::{document_key, Storage};
use docket_worker::EventPublisher;
use uuid::Uuid;

use super::types::{IncomingFile, UploadFailure, UploadMetadata, UploadResponse, UploadedDocument};
use crate::error::storage_error;
use crate::utils::upload::{normalize_mime_type, validate_batch_size, validate_file};

#[derive(Clone)]
pub struct UploadOrchestrator {
    storage: Arc<dyn Storage>,
    repository: Arc<dyn DocumentRepository>,
    publisher: Arc<dyn EventPublisher>,
    policy: UploadPolicy,
}

impl UploadOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        repository: Arc<dyn DocumentRepository>,
        publisher: Arc<dyn EventPublisher>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            storage,
            repository,
            publisher,
            policy,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Check the whole batch against the upload policy. Reports the first offending file.
    pub fn validate(&self, files: &[IncomingFile]) -> Result<(), AppError> {
        validate_batch_size(files.len(), self.policy.max_batch_files)?;
        for file in files {
            validate_file(file, &self.policy)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, files, metadata), fields(upload_id, file_count = files.len()))]
    pub async fn upload(
        &self,
        files: Vec<IncomingFile>,
        metadata: UploadMetadata,
    ) -> Result<UploadResponse, UploadFailure> {
        let upload_id = Uuid::new_v4();
        tracing::Span::current().record("upload_id", tracing::field::display(upload_id));

        if let Err(error) = self.validate(&files) {
            tracing::info!(error = %error, "Upload batch rejected");
            return Err(UploadFailure::rejected(upload_id, error));
        }

        let uploaded_by = metadata
            .uploaded_by
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.policy.default_uploaded_by.clone());

        let mut committed = Vec::with_capacity(files.len());
        for file in &files {
            if let Err(error) = self
                .store_one(file, &metadata, &uploaded_by, &mut committed)
                .await
            {
                tracing::error!(
                    error = %error,
                    file_name = %file.file_name,
                    committed = committed.len(),
                    "Upload batch stopped part way"
                );
                return Err(UploadFailure {
                    upload_id,
                    committed,
                    error,
                });
            }
        }

        tracing::info!(documents = committed.len(), "Upload batch stored");
        Ok(UploadResponse {
            upload_id,
            documents: committed,
        })
    }

    /// Store, persist and announce one file. The summary is pushed onto `committed` as
    /// soon as the record exists, so a publish failure still reports it.
    async fn store_one(
        &self,
        file: &IncomingFile,
        metadata: &UploadMetadata,
        uploaded_by: &str,
        committed: &mut Vec<UploadedDocument>,
    ) -> Result<(), AppError> {
        let mime_type = normalize_mime_type(&file.content_type);
        let document = Document::create_pending(NewDocument {
            file_name: file.file_name.clone(),
            file_size: i64::try_from(file.size).map_err(|_| {
                AppError::PayloadTooLarge(format!("File '{}' is too large", file.file_name))
            })?,
            mime_type: mime_type.clone(),
            uploaded_by: uploaded_by.to_string(),
            tags: metadata.tags.clone(),
            assigned_to: metadata.assigned_to.clone(),
        })?;

        let key = document_key(document.id(), document.uploaded_at(), document.file_name());
        let reader = file.reader().await?;
        let uri = self
            .storage
            .upload_stream(&key, &mime_type, Some(file.size), reader)
            .await
            .map_err(storage_error)?;

        let document = document.attach_storage(uri)?;

        if let Err(e) = self.repository.create(&document).await {
            if let Err(cleanup) = self.storage.delete(&key).await {
                tracing::warn!(
                    error = %cleanup,
                    storage_key = %key,
                    "Failed to remove stored bytes of unpersisted document"
                );
            }
            return Err(e);
        }

        committed.push(UploadedDocument::from(&document));

        self.publisher
            .publish(&DocumentChangedEvent::uploaded(document.id()))
            .await?;

        tracing::debug!(
            document_id = %document.id(),
            file_name = %document.file_name(),
            storage_uri = document.storage_uri().unwrap_or_default(),
            "Document uploaded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::upload::FileContent;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Datelike;
    use docket_core::models::{ChangeType, DocumentStatus};
    use docket_db::InMemoryDocumentRepository;
    use docket_storage::ObjectStorage;
    use docket_worker::InMemoryEventBus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BUCKET: &str = "docket-test";

    struct Harness {
        orchestrator: UploadOrchestrator,
        storage: Arc<ObjectStorage>,
        repository: InMemoryDocumentRepository,
        bus: InMemoryEventBus,
    }

    fn harness() -> Harness {
        harness_with(None, None)
    }

    fn harness_with(
        repository: Option<Arc<dyn DocumentRepository>>,
        publisher: Option<Arc<dyn EventPublisher>>,
    ) -> Harness {
        let storage = Arc::new(ObjectStorage::in_memory(BUCKET));
        let memory_repo = InMemoryDocumentRepository::new();
        let bus = InMemoryEventBus::default();
        let orchestrator = UploadOrchestrator::new(
            storage.clone(),
            repository.unwrap_or_else(|| Arc::new(memory_repo.clone())),
            publisher.unwrap_or_else(|| Arc::new(bus.clone())),
            UploadPolicy::default(),
        );
        Harness {
            orchestrator,
            storage,
            repository: memory_repo,
            bus,
        }
    }

    fn pdf(name: &str, size: usize) -> IncomingFile {
        IncomingFile::from_bytes(name, "application/pdf", vec![b'%'; size])
    }

    /// Repository that fails every create after the first `allow` ones.
    struct FailingRepository {
        inner: InMemoryDocumentRepository,
        allow: usize,
        created: AtomicUsize,
    }

    #[async_trait]
    impl DocumentRepository for FailingRepository {
        async fn create(&self, document: &Document) -> Result<(), AppError> {
            if self.created.fetch_add(1, Ordering::SeqCst) >= self.allow {
                return Err(AppError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.create(document).await
        }

        async fn update(&self, document: &Document) -> Result<Document, AppError> {
            self.inner.update(document).await
        }

        async fn get_by_id(&self, id: Uuid) -> Result<Option<Document>, AppError> {
            self.inner.get_by_id(id).await
        }

        async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
            self.inner.exists(id).await
        }

        async fn list_processing(&self, limit: i64) -> Result<Vec<Document>, AppError> {
            self.inner.list_processing(limit).await
        }

        async fn health_check(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    struct DownPublisher;

    #[async_trait]
    impl EventPublisher for DownPublisher {
        async fn publish(&self, _event: &DocumentChangedEvent) -> Result<(), AppError> {
            Err(AppError::EventBus("broker unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_single_pdf_upload() {
        let h = harness();
        let response = h
            .orchestrator
            .upload(vec![pdf("invoice.pdf", 2 * 1024 * 1024)], UploadMetadata::default())
            .await
            .unwrap();

        assert_eq!(response.documents.len(), 1);
        let summary = &response.documents[0];
        assert_eq!(summary.file_name, "invoice.pdf");
        assert_eq!(summary.file_size, 2 * 1024 * 1024);
        assert_eq!(summary.mime_type, "application/pdf");
        assert_eq!(summary.status, DocumentStatus::Processing);

        let stored = h.repository.get_by_id(summary.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), DocumentStatus::Processing);
        assert_eq!(stored.uploaded_by(), "anonymous");
        let expected_uri = format!(
            "memory://{}/documents/{:04}/{:02}/{}.pdf",
            BUCKET,
            stored.uploaded_at().year(),
            stored.uploaded_at().month(),
            summary.id
        );
        assert_eq!(stored.storage_uri(), Some(expected_uri.as_str()));

        let key = h.storage.key_from_uri(&expected_uri).unwrap();
        assert_eq!(h.storage.download(&key).await.unwrap().len(), 2 * 1024 * 1024);

        let events = h.bus.published();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].document_id, summary.id);
        assert_eq!(events[0].change_type, ChangeType::Uploaded);
    }

    #[tokio::test]
    async fn test_oversize_file_rejected_without_side_effects() {
        let h = harness();
        let file = IncomingFile {
            file_name: "scan.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 60 * 1024 * 1024,
            content: FileContent::Memory(Bytes::from_static(b"%PDF")),
        };

        let failure = h
            .orchestrator
            .upload(vec![file], UploadMetadata::default())
            .await
            .unwrap_err();

        assert!(failure.committed.is_empty());
        match failure.error {
            AppError::PayloadTooLarge(msg) => assert!(msg.contains("scan.pdf")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.repository.snapshot().unwrap().is_empty());
        assert!(h.bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_file_aborts_whole_batch() {
        let h = harness();
        let files = vec![
            pdf("a.pdf", 10),
            IncomingFile::from_bytes("notes.txt", "text/plain", "hello"),
            pdf("c.pdf", 10),
        ];

        let failure = h
            .orchestrator
            .upload(files, UploadMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, AppError::InvalidInput(ref m) if m.contains("notes.txt")));
        assert!(failure.committed.is_empty());
        assert!(h.repository.snapshot().unwrap().is_empty());
        assert!(h.bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_and_uploader_applied() {
        let h = harness();
        let metadata = UploadMetadata {
            tags: vec!["Finance".to_string(), "q1".to_string()],
            assigned_to: vec!["ops".to_string()],
            uploaded_by: Some("alex".to_string()),
        };
        let response = h
            .orchestrator
            .upload(
                vec![IncomingFile::from_bytes(
                    "photo.PNG",
                    "image/png; charset=binary",
                    vec![0u8; 16],
                )],
                metadata,
            )
            .await
            .unwrap();

        let stored = h
            .repository
            .get_by_id(response.documents[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.mime_type(), "image/png");
        assert_eq!(stored.uploaded_by(), "alex");
        assert!(stored.tags().contains("Finance"));
        assert!(stored.assigned_to().contains("ops"));
        assert!(stored.storage_uri().unwrap().ends_with(".png"));
    }

    #[tokio::test]
    async fn test_mid_batch_failure_keeps_committed_files() {
        let inner = InMemoryDocumentRepository::new();
        let failing = Arc::new(FailingRepository {
            inner: inner.clone(),
            allow: 1,
            created: AtomicUsize::new(0),
        });
        let h = harness_with(Some(failing), None);

        let failure = h
            .orchestrator
            .upload(
                vec![pdf("first.pdf", 8), pdf("second.pdf", 8), pdf("third.pdf", 8)],
                UploadMetadata::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(failure.error, AppError::Database(_)));
        assert_eq!(failure.committed.len(), 1);
        assert_eq!(failure.committed[0].file_name, "first.pdf");

        let stored = inner.snapshot().unwrap();
        assert_eq!(stored.len(), 1);
        let events = h.bus.published();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].document_id, failure.committed[0].id);

        // The committed file's bytes stay in place.
        let stored_uri = stored[0].storage_uri().unwrap().to_string();
        assert!(h
            .storage
            .exists(&h.storage.key_from_uri(&stored_uri).unwrap())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_publish_failure_reports_committed_document() {
        let h = harness_with(None, Some(Arc::new(DownPublisher)));

        let failure = h
            .orchestrator
            .upload(
                vec![pdf("a.pdf", 8), pdf("b.pdf", 8)],
                UploadMetadata::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(failure.error, AppError::EventBus(_)));
        assert_eq!(failure.committed.len(), 1);
        assert!(h
            .repository
            .exists(failure.committed[0].id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let h = harness();
        let failure = h
            .orchestrator
            .upload(Vec::new(), UploadMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, AppError::InvalidInput(ref m) if m == "No files provided"));
    }
}
