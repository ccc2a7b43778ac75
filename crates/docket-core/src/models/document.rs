//! Document aggregate.
//!
//! A `Document` only changes through the methods below; each one checks the lifecycle
//! before touching a field. Stage fields (classification, slug, OCR text, extracted data)
//! go from absent to present once and are never cleared. Re-applying a stage that is
//! already present is a no-op, so every mutation reports whether it changed anything.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;

use super::status::DocumentStatus;
use crate::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Classification {
    pub category: String,
    pub subcategory: String,
    /// Probability in `[0, 1]`.
    pub confidence: f64,
}

/// Caller-supplied fields for a new upload.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: String,
    pub tags: Vec<String>,
    pub assigned_to: Vec<String>,
}

/// Flat record shape shared by every repository backend.
///
/// Building a `Document` from parts is reserved for reading trusted records back
/// from a store; new documents go through [`Document::create_pending`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentParts {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_uri: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
    pub status: DocumentStatus,
    pub classification: Option<Classification>,
    pub slug: Option<String>,
    pub ocr_text: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
    pub tags: BTreeSet<String>,
    pub assigned_to: BTreeSet<String>,
    pub classified_at: Option<DateTime<Utc>>,
    pub ocr_completed_at: Option<DateTime<Utc>>,
    pub extraction_completed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    parts: DocumentParts,
}

fn normalize_labels(values: Vec<String>) -> BTreeSet<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Current time at the microsecond precision the database keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

impl Document {
    /// First phase of creation: a fresh `Processing` document with no storage URI yet.
    pub fn create_pending(new: NewDocument) -> Result<Self, AppError> {
        require_non_empty(&new.file_name, "File name")?;
        require_non_empty(&new.mime_type, "MIME type")?;
        if new.file_size < 0 {
            return Err(AppError::InvalidInput(
                "File size must not be negative".to_string(),
            ));
        }

        Ok(Document {
            parts: DocumentParts {
                id: Uuid::new_v4(),
                file_name: new.file_name,
                file_size: new.file_size,
                mime_type: new.mime_type,
                storage_uri: None,
                uploaded_at: now(),
                uploaded_by: new.uploaded_by,
                status: DocumentStatus::Processing,
                classification: None,
                slug: None,
                ocr_text: None,
                extracted_data: None,
                tags: normalize_labels(new.tags),
                assigned_to: normalize_labels(new.assigned_to),
                classified_at: None,
                ocr_completed_at: None,
                extraction_completed_at: None,
                finished_at: None,
                deleted_at: None,
            },
        })
    }

    /// Second phase of creation: bind the stored bytes' URI.
    pub fn attach_storage(mut self, uri: impl Into<String>) -> Result<Self, AppError> {
        self.set_storage_uri(uri)?;
        Ok(self)
    }

    /// Rebuild a document read from a store.
    pub fn from_parts(parts: DocumentParts) -> Self {
        Document { parts }
    }

    pub fn parts(&self) -> &DocumentParts {
        &self.parts
    }

    pub fn into_parts(self) -> DocumentParts {
        self.parts
    }

    pub fn id(&self) -> Uuid {
        self.parts.id
    }

    pub fn file_name(&self) -> &str {
        &self.parts.file_name
    }

    pub fn file_size(&self) -> i64 {
        self.parts.file_size
    }

    pub fn mime_type(&self) -> &str {
        &self.parts.mime_type
    }

    pub fn storage_uri(&self) -> Option<&str> {
        self.parts.storage_uri.as_deref()
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.parts.uploaded_at
    }

    pub fn uploaded_by(&self) -> &str {
        &self.parts.uploaded_by
    }

    pub fn status(&self) -> DocumentStatus {
        self.parts.status
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.parts.classification.as_ref()
    }

    pub fn category(&self) -> Option<&str> {
        self.parts
            .classification
            .as_ref()
            .map(|c| c.category.as_str())
    }

    pub fn slug(&self) -> Option<&str> {
        self.parts.slug.as_deref()
    }

    pub fn ocr_text(&self) -> Option<&str> {
        self.parts.ocr_text.as_deref()
    }

    pub fn extracted_data(&self) -> Option<&serde_json::Value> {
        self.parts.extracted_data.as_ref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.parts.tags
    }

    pub fn assigned_to(&self) -> &BTreeSet<String> {
        &self.parts.assigned_to
    }

    pub fn classified_at(&self) -> Option<DateTime<Utc>> {
        self.parts.classified_at
    }

    pub fn ocr_completed_at(&self) -> Option<DateTime<Utc>> {
        self.parts.ocr_completed_at
    }

    pub fn extraction_completed_at(&self) -> Option<DateTime<Utc>> {
        self.parts.extraction_completed_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.parts.finished_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.parts.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.parts.status.is_terminal()
    }

    fn ensure_mutable(&self, action: &str) -> Result<(), AppError> {
        if self.is_deleted() {
            return Err(AppError::InvalidState(format!(
                "Cannot {} document '{}': document is deleted",
                action, self.parts.id
            )));
        }
        Ok(())
    }

    /// Storage URI is write-once: the same URI again is accepted, a different one is not.
    pub fn set_storage_uri(&mut self, uri: impl Into<String>) -> Result<(), AppError> {
        self.ensure_mutable("set storage URI on")?;
        let uri = uri.into();
        require_non_empty(&uri, "Storage URI")?;

        match self.parts.storage_uri.as_deref() {
            None => {
                self.parts.storage_uri = Some(uri);
                Ok(())
            }
            Some(existing) if existing == uri => Ok(()),
            Some(existing) => Err(AppError::InvalidState(format!(
                "Document '{}' is already stored at '{}'",
                self.parts.id, existing
            ))),
        }
    }

    pub fn update_classification(
        &mut self,
        category: impl Into<String>,
        subcategory: impl Into<String>,
        confidence: f64,
    ) -> Result<bool, AppError> {
        self.ensure_mutable("classify")?;
        let category = category.into();
        let subcategory = subcategory.into();
        require_non_empty(&category, "Category")?;
        require_non_empty(&subcategory, "Subcategory")?;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(AppError::InvalidInput(format!(
                "Classification confidence must be within [0, 1], got {}",
                confidence
            )));
        }

        if self.parts.classification.is_some() {
            tracing::debug!(document_id = %self.parts.id, "Classification already present");
            return Ok(false);
        }

        self.parts.classification = Some(Classification {
            category,
            subcategory,
            confidence,
        });
        self.parts.classified_at.get_or_insert_with(now);
        Ok(true)
    }

    pub fn set_slug(&mut self, slug: impl Into<String>) -> Result<bool, AppError> {
        self.ensure_mutable("set slug on")?;
        let slug = slug.into();
        require_non_empty(&slug, "Slug")?;

        if self.parts.slug.is_some() {
            return Ok(false);
        }
        self.parts.slug = Some(slug);
        Ok(true)
    }

    pub fn update_ocr_text(&mut self, text: impl Into<String>) -> Result<bool, AppError> {
        self.ensure_mutable("store OCR text on")?;
        if self.parts.ocr_text.is_some() {
            return Ok(false);
        }
        self.parts.ocr_text = Some(text.into());
        self.parts.ocr_completed_at.get_or_insert_with(now);
        Ok(true)
    }

    pub fn update_extracted_data(&mut self, data: serde_json::Value) -> Result<bool, AppError> {
        self.ensure_mutable("store extracted data on")?;
        if self.parts.extracted_data.is_some() {
            return Ok(false);
        }
        self.parts.extracted_data = Some(data);
        self.parts
            .extraction_completed_at
            .get_or_insert_with(now);
        Ok(true)
    }

    /// Move to `Finished`. Whether optional stages were required is the caller's check
    /// (see [`Document::is_processing_complete`]); classification and slug are always required.
    pub fn mark_finished(&mut self) -> Result<bool, AppError> {
        self.ensure_mutable("finish")?;
        if self.parts.status == DocumentStatus::Finished {
            return Ok(false);
        }
        if self.parts.classification.is_none() || self.parts.slug.is_none() {
            return Err(AppError::InvalidState(format!(
                "Document '{}' cannot finish before classification and slug are set",
                self.parts.id
            )));
        }
        if !self.parts.status.can_transition_to(DocumentStatus::Finished) {
            return Err(AppError::InvalidState(format!(
                "Document '{}' cannot finish from status '{}'",
                self.parts.id, self.parts.status
            )));
        }

        self.parts.status = DocumentStatus::Finished;
        self.parts.finished_at.get_or_insert_with(now);
        Ok(true)
    }

    /// Soft delete. A second call leaves the document untouched.
    pub fn delete(&mut self) -> bool {
        if self.is_deleted() {
            return false;
        }
        self.parts.status = DocumentStatus::Deleted;
        self.parts.deleted_at.get_or_insert_with(now);
        true
    }

    pub fn needs_classification(&self) -> bool {
        self.parts.classification.is_none()
    }

    pub fn needs_ocr(&self, ocr_enabled: bool) -> bool {
        !self.needs_classification() && ocr_enabled && self.parts.ocr_text.is_none()
    }

    pub fn needs_extraction(&self, extraction_enabled: bool) -> bool {
        !self.needs_classification() && extraction_enabled && self.parts.extracted_data.is_none()
    }

    pub fn is_processing_complete(&self, ocr_required: bool, extraction_required: bool) -> bool {
        !self.needs_classification()
            && self.parts.slug.is_some()
            && (!ocr_required || self.parts.ocr_text.is_some())
            && (!extraction_required || self.parts.extracted_data.is_some())
    }

    /// Combine a stored record (`self`) with an incoming write of the same document.
    ///
    /// Stage fields and timestamps keep the stored value when present, labels are
    /// unioned and status keeps the higher rank. A deleted record absorbs nothing.
    /// Applying the same incoming record twice, or two writes touching different stage
    /// fields in either order, yields the same result.
    pub fn merged_with(&self, incoming: &Document) -> Document {
        if self.is_deleted() {
            return self.clone();
        }

        let stored = &self.parts;
        let next = &incoming.parts;

        let status = if next.status.rank() > stored.status.rank() {
            next.status
        } else {
            stored.status
        };

        Document {
            parts: DocumentParts {
                id: stored.id,
                file_name: stored.file_name.clone(),
                file_size: stored.file_size,
                mime_type: stored.mime_type.clone(),
                storage_uri: stored
                    .storage_uri
                    .clone()
                    .or_else(|| next.storage_uri.clone()),
                uploaded_at: stored.uploaded_at,
                uploaded_by: stored.uploaded_by.clone(),
                status,
                classification: stored
                    .classification
                    .clone()
                    .or_else(|| next.classification.clone()),
                slug: stored.slug.clone().or_else(|| next.slug.clone()),
                ocr_text: stored.ocr_text.clone().or_else(|| next.ocr_text.clone()),
                extracted_data: stored
                    .extracted_data
                    .clone()
                    .or_else(|| next.extracted_data.clone()),
                tags: stored.tags.union(&next.tags).cloned().collect(),
                assigned_to: stored
                    .assigned_to
                    .union(&next.assigned_to)
                    .cloned()
                    .collect(),
                classified_at: stored.classified_at.or(next.classified_at),
                ocr_completed_at: stored.ocr_completed_at.or(next.ocr_completed_at),
                extraction_completed_at: stored
                    .extraction_completed_at
                    .or(next.extraction_completed_at),
                finished_at: stored.finished_at.or(next.finished_at),
                deleted_at: stored.deleted_at.or(next.deleted_at),
            },
        }
    }
}

/// Full document view returned by `GET /documents/{id}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDto {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
    pub status: DocumentStatus,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub classification_confidence: Option<f64>,
    pub slug: Option<String>,
    pub tags: Vec<String>,
    pub assigned_to: Vec<String>,
    pub storage_uri: Option<String>,
    pub ocr_text: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub extracted_data: Option<serde_json::Value>,
    pub classified_at: Option<DateTime<Utc>>,
    pub ocr_completed_at: Option<DateTime<Utc>>,
    pub extraction_completed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<Document> for DocumentDto {
    fn from(doc: Document) -> Self {
        let parts = doc.into_parts();
        let (category, subcategory, classification_confidence) = match parts.classification {
            Some(c) => (Some(c.category), Some(c.subcategory), Some(c.confidence)),
            None => (None, None, None),
        };

        DocumentDto {
            id: parts.id,
            file_name: parts.file_name,
            file_size: parts.file_size,
            mime_type: parts.mime_type,
            uploaded_at: parts.uploaded_at,
            uploaded_by: parts.uploaded_by,
            status: parts.status,
            category,
            subcategory,
            classification_confidence,
            slug: parts.slug,
            tags: parts.tags.into_iter().collect(),
            assigned_to: parts.assigned_to.into_iter().collect(),
            storage_uri: parts.storage_uri,
            ocr_text: parts.ocr_text,
            extracted_data: parts.extracted_data,
            classified_at: parts.classified_at,
            ocr_completed_at: parts.ocr_completed_at,
            extraction_completed_at: parts.extraction_completed_at,
            finished_at: parts.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_pdf() -> NewDocument {
        NewDocument {
            file_name: "invoice.pdf".to_string(),
            file_size: 2 * 1024 * 1024,
            mime_type: "application/pdf".to_string(),
            uploaded_by: "anonymous".to_string(),
            tags: vec!["finance".to_string(), " ".to_string()],
            assigned_to: vec![],
        }
    }

    fn stored_pdf() -> Document {
        Document::create_pending(new_pdf())
            .unwrap()
            .attach_storage("gs://bucket/documents/2026/10/x.pdf")
            .unwrap()
    }

    #[test]
    fn test_create_pending_starts_processing_without_uri() {
        let doc = Document::create_pending(new_pdf()).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Processing);
        assert!(doc.storage_uri().is_none());
        assert_eq!(doc.tags().len(), 1);
        assert!(doc.needs_classification());
    }

    #[test]
    fn test_timestamps_have_microsecond_precision() {
        let mut doc = stored_pdf();
        doc.update_classification("invoice", "utility", 0.9).unwrap();
        doc.delete();

        let stamps = [doc.uploaded_at(), doc.classified_at().unwrap(), doc.deleted_at().unwrap()];
        for stamp in stamps {
            assert_eq!(stamp.timestamp_subsec_nanos() % 1_000, 0);
        }
    }

    #[test]
    fn test_create_pending_rejects_empty_name_or_mime() {
        let mut new = new_pdf();
        new.file_name = "  ".to_string();
        assert!(matches!(
            Document::create_pending(new),
            Err(AppError::InvalidInput(_))
        ));

        let mut new = new_pdf();
        new.mime_type = String::new();
        assert!(matches!(
            Document::create_pending(new),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_storage_uri_is_write_once() {
        let mut doc = stored_pdf();
        assert!(doc
            .set_storage_uri("gs://bucket/documents/2026/10/x.pdf")
            .is_ok());
        assert!(matches!(
            doc.set_storage_uri("gs://bucket/other.pdf"),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_classification_rejects_out_of_range_confidence() {
        let mut doc = stored_pdf();
        assert!(matches!(
            doc.update_classification("invoice", "utility", 1.5),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            doc.update_classification("invoice", "utility", f64::NAN),
            Err(AppError::InvalidInput(_))
        ));
        assert!(doc.needs_classification());
    }

    #[test]
    fn test_classification_then_slug_completes_without_optional_stages() {
        let mut doc = stored_pdf();
        assert!(doc.update_classification("invoice", "utility", 0.92).unwrap());
        assert!(!doc.needs_classification());
        assert!(doc.classified_at().is_some());
        assert!(!doc.is_processing_complete(false, false));

        assert!(doc.set_slug("invoice-2024-001").unwrap());
        assert!(doc.is_processing_complete(false, false));
        assert!(!doc.is_processing_complete(true, false));
    }

    #[test]
    fn test_stage_fields_are_first_write_wins() {
        let mut doc = stored_pdf();
        doc.update_classification("invoice", "utility", 0.92).unwrap();
        let classified_at = doc.classified_at();

        assert!(!doc.update_classification("receipt", "food", 0.5).unwrap());
        assert_eq!(doc.category(), Some("invoice"));
        assert_eq!(doc.classified_at(), classified_at);

        assert!(doc.update_ocr_text("page one").unwrap());
        assert!(!doc.update_ocr_text("page two").unwrap());
        assert_eq!(doc.ocr_text(), Some("page one"));
    }

    #[test]
    fn test_needs_ocr_false_when_disabled() {
        let mut doc = stored_pdf();
        assert!(!doc.needs_ocr(false));
        assert!(!doc.needs_ocr(true), "OCR waits for classification");
        doc.update_classification("invoice", "utility", 0.9).unwrap();
        assert!(doc.needs_ocr(true));
        assert!(!doc.needs_ocr(false));
        doc.update_ocr_text("text").unwrap();
        assert!(!doc.needs_ocr(true));
        assert!(!doc.needs_ocr(false));
    }

    #[test]
    fn test_needs_extraction() {
        let mut doc = stored_pdf();
        doc.update_classification("invoice", "utility", 0.9).unwrap();
        assert!(doc.needs_extraction(true));
        assert!(!doc.needs_extraction(false));
        doc.update_extracted_data(json!({"total": 42})).unwrap();
        assert!(!doc.needs_extraction(true));
        assert!(doc.extraction_completed_at().is_some());
    }

    #[test]
    fn test_completion_with_ocr_required_ignores_extraction() {
        let mut doc = stored_pdf();
        doc.update_classification("invoice", "utility", 0.9).unwrap();
        doc.set_slug("invoice-1").unwrap();
        assert!(!doc.is_processing_complete(true, false));
        doc.update_ocr_text("text").unwrap();
        assert!(doc.is_processing_complete(true, false));
        assert!(doc.extracted_data().is_none());
    }

    #[test]
    fn test_mark_finished_requires_classification_and_slug() {
        let mut doc = stored_pdf();
        assert!(matches!(doc.mark_finished(), Err(AppError::InvalidState(_))));

        doc.update_classification("invoice", "utility", 0.9).unwrap();
        doc.set_slug("invoice-1").unwrap();
        assert!(doc.mark_finished().unwrap());
        assert_eq!(doc.status(), DocumentStatus::Finished);
        assert!(doc.finished_at().is_some());
        assert!(!doc.mark_finished().unwrap());
    }

    #[test]
    fn test_deleted_document_rejects_every_mutation() {
        let mut doc = stored_pdf();
        assert!(doc.delete());
        let deleted_at = doc.deleted_at();
        assert!(deleted_at.is_some());

        assert!(matches!(
            doc.update_classification("invoice", "utility", 0.9),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(doc.set_slug("s"), Err(AppError::InvalidState(_))));
        assert!(matches!(
            doc.update_ocr_text("t"),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            doc.update_extracted_data(json!({})),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(doc.mark_finished(), Err(AppError::InvalidState(_))));
        assert!(matches!(
            doc.set_storage_uri("gs://bucket/documents/2026/10/x.pdf"),
            Err(AppError::InvalidState(_))
        ));

        assert!(!doc.delete());
        assert_eq!(doc.deleted_at(), deleted_at);
        assert_eq!(doc.status(), DocumentStatus::Deleted);
    }

    #[test]
    fn test_finished_document_can_be_deleted() {
        let mut doc = stored_pdf();
        doc.update_classification("invoice", "utility", 0.9).unwrap();
        doc.set_slug("invoice-1").unwrap();
        doc.mark_finished().unwrap();
        assert!(doc.delete());
        assert_eq!(doc.status(), DocumentStatus::Deleted);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let stored = stored_pdf();
        let mut incoming = stored.clone();
        incoming.update_classification("invoice", "utility", 0.9).unwrap();

        let once = stored.merged_with(&incoming);
        let twice = once.merged_with(&incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_is_commutative_for_disjoint_stages() {
        let stored = stored_pdf();

        let mut classified = stored.clone();
        classified
            .update_classification("invoice", "utility", 0.9)
            .unwrap();
        let mut ocr = stored.clone();
        // OCR writers work off a classified copy of the record.
        ocr.update_classification("invoice", "utility", 0.9).unwrap();
        ocr.update_ocr_text("text").unwrap();
        let mut ocr_only = stored.clone().into_parts();
        ocr_only.ocr_text = ocr.ocr_text().map(String::from);
        ocr_only.ocr_completed_at = ocr.ocr_completed_at();
        let ocr_only = Document::from_parts(ocr_only);

        let a = stored.merged_with(&classified).merged_with(&ocr_only);
        let b = stored.merged_with(&ocr_only).merged_with(&classified);
        assert_eq!(a, b);
        assert_eq!(a.category(), Some("invoice"));
        assert_eq!(a.ocr_text(), Some("text"));
    }

    #[test]
    fn test_merge_keeps_higher_status_and_unions_labels() {
        let stored = stored_pdf();
        let mut finished = stored.clone();
        finished
            .update_classification("invoice", "utility", 0.9)
            .unwrap();
        finished.set_slug("invoice-1").unwrap();
        finished.mark_finished().unwrap();

        let mut stale = stored.clone().into_parts();
        stale.tags.insert("late".to_string());
        let stale = Document::from_parts(stale);

        let merged = stored.merged_with(&finished).merged_with(&stale);
        assert_eq!(merged.status(), DocumentStatus::Finished);
        assert!(merged.tags().contains("late"));
        assert!(merged.tags().contains("finance"));
    }

    #[test]
    fn test_merge_into_deleted_record_changes_nothing() {
        let mut deleted = stored_pdf();
        let mut incoming = deleted.clone();
        deleted.delete();
        incoming
            .update_classification("invoice", "utility", 0.9)
            .unwrap();

        let merged = deleted.merged_with(&incoming);
        assert_eq!(merged, deleted);
        assert!(merged.needs_classification());
    }

    #[test]
    fn test_dto_flattens_classification() {
        let mut doc = stored_pdf();
        doc.update_classification("invoice", "utility", 0.92).unwrap();
        let dto = DocumentDto::from(doc.clone());
        assert_eq!(dto.id, doc.id());
        assert_eq!(dto.category.as_deref(), Some("invoice"));
        assert_eq!(dto.classification_confidence, Some(0.92));
        assert_eq!(dto.status, DocumentStatus::Processing);
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["fileName"], "invoice.pdf");
        assert_eq!(json["status"], "processing");
    }
}
