use docket_core::models::{Document, DocumentStatus};
use docket_core::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::document::{ensure_creatable, DocumentRepository};

/// Process-local document repository.
///
/// Merges happen under a single lock, which gives the same per-document serialisation
/// the PostgreSQL row lock provides.
#[derive(Clone, Default)]
pub struct InMemoryDocumentRepository {
    documents: Arc<Mutex<HashMap<Uuid, Document>>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Document>>, AppError> {
        self.documents
            .lock()
            .map_err(|_| AppError::Internal("Document store lock poisoned".to_string()))
    }

    /// Every stored document, in no particular order.
    pub fn snapshot(&self) -> Result<Vec<Document>, AppError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

#[async_trait::async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn create(&self, document: &Document) -> Result<(), AppError> {
        ensure_creatable(document)?;
        let mut documents = self.lock()?;
        if documents.contains_key(&document.id()) {
            return Err(AppError::Conflict(format!(
                "Document '{}' already exists",
                document.id()
            )));
        }
        documents.insert(document.id(), document.clone());
        Ok(())
    }

    async fn update(&self, document: &Document) -> Result<Document, AppError> {
        let mut documents = self.lock()?;
        let existing = documents
            .get_mut(&document.id())
            .ok_or_else(|| AppError::DocumentNotFound(document.id().to_string()))?;
        let merged = existing.merged_with(document);
        *existing = merged.clone();
        Ok(merged)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock()?.contains_key(&id))
    }

    async fn list_processing(&self, limit: i64) -> Result<Vec<Document>, AppError> {
        let mut processing: Vec<Document> = self
            .lock()?
            .values()
            .filter(|d| d.status() == DocumentStatus::Processing)
            .cloned()
            .collect();
        processing.sort_by_key(|d| d.uploaded_at());
        processing.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(processing)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::models::NewDocument;

    fn stored_document() -> Document {
        Document::create_pending(NewDocument {
            file_name: "invoice.pdf".to_string(),
            file_size: 1024,
            mime_type: "application/pdf".to_string(),
            uploaded_by: "anonymous".to_string(),
            ..Default::default()
        })
        .unwrap()
        .attach_storage("memory://plc-documents/documents/2026/01/a.pdf")
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryDocumentRepository::new();
        let doc = stored_document();
        repo.create(&doc).await.unwrap();

        assert!(repo.exists(doc.id()).await.unwrap());
        assert_eq!(repo.get_by_id(doc.id()).await.unwrap(), Some(doc));
        assert_eq!(repo.get_by_id(Uuid::new_v4()).await.unwrap(), None);
        assert!(!repo.exists(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_and_unstored() {
        let repo = InMemoryDocumentRepository::new();
        let doc = stored_document();
        repo.create(&doc).await.unwrap();
        assert!(matches!(
            repo.create(&doc).await,
            Err(AppError::Conflict(_))
        ));

        let pending = Document::create_pending(NewDocument {
            file_name: "a.png".to_string(),
            mime_type: "image/png".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            repo.create(&pending).await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let repo = InMemoryDocumentRepository::new();
        assert!(matches!(
            repo.update(&stored_document()).await,
            Err(AppError::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_twice_is_idempotent() {
        let repo = InMemoryDocumentRepository::new();
        let doc = stored_document();
        repo.create(&doc).await.unwrap();

        let mut classified = doc.clone();
        classified
            .update_classification("invoice", "utility", 0.92)
            .unwrap();

        let once = repo.update(&classified).await.unwrap();
        let twice = repo.update(&classified).await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(repo.get_by_id(doc.id()).await.unwrap(), Some(once));
    }

    #[tokio::test]
    async fn test_concurrent_stage_writes_do_not_clobber() {
        let repo = InMemoryDocumentRepository::new();
        let doc = stored_document();
        repo.create(&doc).await.unwrap();

        // Each writer starts from the same stale copy.
        let mut classified = doc.clone();
        classified
            .update_classification("invoice", "utility", 0.92)
            .unwrap();
        let mut parts = doc.clone().into_parts();
        parts.ocr_text = Some("Total due: 42".to_string());
        let with_ocr = Document::from_parts(parts);
        let mut slugged = doc.clone();
        slugged.set_slug("invoice-2024-001").unwrap();

        let handles: Vec<_> = [classified, with_ocr, slugged]
            .into_iter()
            .map(|d| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.update(&d).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = repo.get_by_id(doc.id()).await.unwrap().unwrap();
        assert_eq!(stored.category(), Some("invoice"));
        assert_eq!(stored.ocr_text(), Some("Total due: 42"));
        assert_eq!(stored.slug(), Some("invoice-2024-001"));
    }

    #[tokio::test]
    async fn test_stale_write_cannot_resurrect_deleted() {
        let repo = InMemoryDocumentRepository::new();
        let doc = stored_document();
        repo.create(&doc).await.unwrap();

        let mut deleted = doc.clone();
        deleted.delete();
        repo.update(&deleted).await.unwrap();

        let mut stale = doc.clone();
        stale.update_classification("invoice", "utility", 0.9).unwrap();
        let merged = repo.update(&stale).await.unwrap();

        assert_eq!(merged.status(), DocumentStatus::Deleted);
        assert!(merged.needs_classification());
    }

    #[tokio::test]
    async fn test_list_processing_excludes_finished_and_deleted() {
        let repo = InMemoryDocumentRepository::new();
        let processing = stored_document();
        let mut finished = stored_document();
        finished.update_classification("invoice", "utility", 0.9).unwrap();
        finished.set_slug("invoice-1").unwrap();
        finished.mark_finished().unwrap();
        let mut deleted = stored_document();
        deleted.delete();

        for doc in [&processing, &finished, &deleted] {
            repo.create(doc).await.unwrap();
        }

        let listed = repo.list_processing(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), processing.id());
        assert!(repo.list_processing(0).await.unwrap().is_empty());
    }
}
