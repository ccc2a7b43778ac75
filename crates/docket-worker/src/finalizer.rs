//! Built-in Finalize stage: moves a document to `Finished` once every required stage is in.

use async_trait::async_trait;
use docket_core::models::Document;
use docket_core::{AppError, ProcessingFlags, WorkerConfig};
use docket_db::DocumentRepository;
use std::sync::Arc;

use crate::bus::EventPublisher;
use crate::coordinator::{Stage, StageHandler, StageOutput, StageWorker};

/// The stage worker only calls this when [`Stage::Finalize`] is needed, i.e. the document
/// is still processing and complete for the configured flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct Finalizer;

#[async_trait]
impl StageHandler for Finalizer {
    fn stage(&self) -> Stage {
        Stage::Finalize
    }

    async fn handle(&self, _document: &Document) -> Result<StageOutput, AppError> {
        Ok(StageOutput::Finished)
    }
}

pub fn finalizer_worker(
    repository: Arc<dyn DocumentRepository>,
    publisher: Arc<dyn EventPublisher>,
    flags: ProcessingFlags,
    config: WorkerConfig,
) -> StageWorker {
    StageWorker::new(Arc::new(Finalizer), repository, publisher, flags, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryEventBus;
    use crate::coordinator::StageOutcome;
    use docket_core::models::{DocumentStatus, NewDocument};
    use docket_db::InMemoryDocumentRepository;

    fn classified_document() -> Document {
        let mut doc = Document::create_pending(NewDocument {
            file_name: "invoice.pdf".to_string(),
            file_size: 1024,
            mime_type: "application/pdf".to_string(),
            uploaded_by: "anonymous".to_string(),
            ..Default::default()
        })
        .unwrap()
        .attach_storage("memory://docs/documents/2026/01/a.pdf")
        .unwrap();
        doc.update_classification("invoice", "utility", 0.92).unwrap();
        doc.set_slug("invoice-2024-001").unwrap();
        doc
    }

    #[tokio::test]
    async fn test_finishes_when_optional_stages_disabled() {
        let repo = InMemoryDocumentRepository::new();
        let bus = InMemoryEventBus::default();
        let doc = classified_document();
        repo.create(&doc).await.unwrap();

        let worker = finalizer_worker(
            Arc::new(repo.clone()),
            Arc::new(bus.clone()),
            ProcessingFlags::new(false, false),
            WorkerConfig::default(),
        );

        let outcome = worker.process(doc.id()).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Applied(_)));
        let stored = repo.get_by_id(doc.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), DocumentStatus::Finished);
        assert!(stored.finished_at().is_some());
        assert_eq!(bus.published_for(doc.id()).len(), 1);

        // Finished documents are no longer candidates.
        assert_eq!(worker.process(doc.id()).await.unwrap(), StageOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_waits_for_required_stages() {
        let repo = InMemoryDocumentRepository::new();
        let bus = InMemoryEventBus::default();
        let doc = classified_document();
        repo.create(&doc).await.unwrap();

        let worker = finalizer_worker(
            Arc::new(repo.clone()),
            Arc::new(bus.clone()),
            ProcessingFlags::default(),
            WorkerConfig::default(),
        );
        assert_eq!(worker.process(doc.id()).await.unwrap(), StageOutcome::Skipped);

        let mut with_ocr = doc.clone();
        with_ocr.update_ocr_text("Total due: 42").unwrap();
        repo.update(&with_ocr).await.unwrap();
        assert_eq!(worker.process(doc.id()).await.unwrap(), StageOutcome::Skipped);

        let mut with_data = doc.clone();
        with_data
            .update_extracted_data(serde_json::json!({"total": 42}))
            .unwrap();
        repo.update(&with_data).await.unwrap();
        assert!(matches!(
            worker.process(doc.id()).await.unwrap(),
            StageOutcome::Applied(_)
        ));
    }
}
