use chrono::{DateTime, Utc};
use docket_core::models::{
    Classification, Document, DocumentParts, DocumentStatus, STATUS_CODEC_VERSION,
};
use docket_core::{AppError, RepositoryBackend, RepositoryConfig};
use sqlx::{FromRow, PgPool, Postgres};
use std::sync::Arc;
use uuid::Uuid;

use super::memory::InMemoryDocumentRepository;

/// Trait for document repository operations
///
/// `update` merges the incoming document into the stored one (see
/// [`Document::merged_with`]) instead of overwriting it, so workers writing different
/// stages of the same document never clobber each other.
#[async_trait::async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a brand-new document. It must already carry its storage URI.
    async fn create(&self, document: &Document) -> Result<(), AppError>;

    /// Merge `document` into the stored record and return the result.
    async fn update(&self, document: &Document) -> Result<Document, AppError>;

    /// `None` when the id is unknown.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Document>, AppError>;

    async fn exists(&self, id: Uuid) -> Result<bool, AppError>;

    /// Documents still in `Processing`, oldest upload first.
    async fn list_processing(&self, limit: i64) -> Result<Vec<Document>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

pub(crate) fn ensure_creatable(document: &Document) -> Result<(), AppError> {
    if document.storage_uri().is_none() {
        return Err(AppError::InvalidState(format!(
            "Document '{}' cannot be persisted before its bytes are stored",
            document.id()
        )));
    }
    Ok(())
}

const DOCUMENT_COLUMNS: &str = "id, file_name, file_size, mime_type, storage_uri, uploaded_at, \
    uploaded_by, status, status_version, category, subcategory, classification_confidence, slug, \
    ocr_text, extracted_data, tags, assigned_to, classified_at, ocr_completed_at, \
    extraction_completed_at, finished_at, deleted_at";

/// Database row for the documents table.
#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    file_name: String,
    file_size: i64,
    mime_type: String,
    storage_uri: String,
    uploaded_at: DateTime<Utc>,
    uploaded_by: String,
    status: String,
    status_version: i16,
    category: Option<String>,
    subcategory: Option<String>,
    classification_confidence: Option<f64>,
    slug: Option<String>,
    ocr_text: Option<String>,
    extracted_data: Option<serde_json::Value>,
    tags: Vec<String>,
    assigned_to: Vec<String>,
    classified_at: Option<DateTime<Utc>>,
    ocr_completed_at: Option<DateTime<Utc>>,
    extraction_completed_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document, AppError> {
        let status = DocumentStatus::decode(&self.status, self.status_version)?;
        let classification = match (self.category, self.subcategory) {
            (Some(category), Some(subcategory)) => Some(Classification {
                category,
                subcategory,
                confidence: self.classification_confidence.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Document::from_parts(DocumentParts {
            id: self.id,
            file_name: self.file_name,
            file_size: self.file_size,
            mime_type: self.mime_type,
            storage_uri: Some(self.storage_uri),
            uploaded_at: self.uploaded_at,
            uploaded_by: self.uploaded_by,
            status,
            classification,
            slug: self.slug,
            ocr_text: self.ocr_text,
            extracted_data: self.extracted_data,
            tags: self.tags.into_iter().collect(),
            assigned_to: self.assigned_to.into_iter().collect(),
            classified_at: self.classified_at,
            ocr_completed_at: self.ocr_completed_at,
            extraction_completed_at: self.extraction_completed_at,
            finished_at: self.finished_at,
            deleted_at: self.deleted_at,
        }))
    }
}

#[derive(Clone)]
pub struct PostgresDocumentRepository {
    pool: PgPool,
}

impl PostgresDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    #[tracing::instrument(skip(self, document), fields(
        db.system = "postgresql",
        db.table = "documents",
        db.operation = "insert",
        document.id = %document.id()
    ))]
    async fn create(&self, document: &Document) -> Result<(), AppError> {
        ensure_creatable(document)?;
        let parts = document.parts();
        let classification = parts.classification.as_ref();

        let result = sqlx::query(
            r#"
            INSERT INTO documents (
                id, file_name, file_size, mime_type, storage_uri, uploaded_at, uploaded_by,
                status, status_version, category, subcategory, classification_confidence, slug,
                ocr_text, extracted_data, tags, assigned_to, classified_at, ocr_completed_at,
                extraction_completed_at, finished_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(parts.id)
        .bind(&parts.file_name)
        .bind(parts.file_size)
        .bind(&parts.mime_type)
        .bind(&parts.storage_uri)
        .bind(parts.uploaded_at)
        .bind(&parts.uploaded_by)
        .bind(parts.status.encode())
        .bind(STATUS_CODEC_VERSION)
        .bind(classification.map(|c| c.category.as_str()))
        .bind(classification.map(|c| c.subcategory.as_str()))
        .bind(classification.map(|c| c.confidence))
        .bind(&parts.slug)
        .bind(&parts.ocr_text)
        .bind(&parts.extracted_data)
        .bind(parts.tags.iter().cloned().collect::<Vec<String>>())
        .bind(parts.assigned_to.iter().cloned().collect::<Vec<String>>())
        .bind(parts.classified_at)
        .bind(parts.ocr_completed_at)
        .bind(parts.extraction_completed_at)
        .bind(parts.finished_at)
        .bind(parts.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, "Failed to insert document");
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Document '{}' already exists",
                parts.id
            )));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, document), fields(
        db.system = "postgresql",
        db.table = "documents",
        db.operation = "update",
        document.id = %document.id()
    ))]
    async fn update(&self, document: &Document) -> Result<Document, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises concurrent merges of the same document.
        let row = sqlx::query_as::<Postgres, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE id = $1 FOR UPDATE",
            DOCUMENT_COLUMNS
        ))
        .bind(document.id())
        .fetch_optional(&mut *tx)
        .await?;

        let existing = match row {
            Some(row) => row.into_document()?,
            None => return Err(AppError::DocumentNotFound(document.id().to_string())),
        };

        let merged = existing.merged_with(document);
        if merged == existing {
            tx.commit().await?;
            tracing::debug!("Merge produced no change");
            return Ok(merged);
        }

        let parts = merged.parts();
        let classification = parts.classification.as_ref();

        sqlx::query(
            r#"
            UPDATE documents SET
                storage_uri = COALESCE($2, storage_uri),
                status = $3,
                status_version = $4,
                category = $5,
                subcategory = $6,
                classification_confidence = $7,
                slug = $8,
                ocr_text = $9,
                extracted_data = $10,
                tags = $11,
                assigned_to = $12,
                classified_at = $13,
                ocr_completed_at = $14,
                extraction_completed_at = $15,
                finished_at = $16,
                deleted_at = $17,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(parts.id)
        .bind(&parts.storage_uri)
        .bind(parts.status.encode())
        .bind(STATUS_CODEC_VERSION)
        .bind(classification.map(|c| c.category.as_str()))
        .bind(classification.map(|c| c.subcategory.as_str()))
        .bind(classification.map(|c| c.confidence))
        .bind(&parts.slug)
        .bind(&parts.ocr_text)
        .bind(&parts.extracted_data)
        .bind(parts.tags.iter().cloned().collect::<Vec<String>>())
        .bind(parts.assigned_to.iter().cloned().collect::<Vec<String>>())
        .bind(parts.classified_at)
        .bind(parts.ocr_completed_at)
        .bind(parts.extraction_completed_at)
        .bind(parts.finished_at)
        .bind(parts.deleted_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(status = %parts.status, "Document merged");
        Ok(merged)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select"))]
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        let row = sqlx::query_as::<Postgres, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select"))]
    async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM documents WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select"))]
    async fn list_processing(&self, limit: i64) -> Result<Vec<Document>, AppError> {
        let rows = sqlx::query_as::<Postgres, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE lower(status) = $1 ORDER BY uploaded_at ASC LIMIT $2",
            DOCUMENT_COLUMNS
        ))
        .bind(DocumentStatus::Processing.encode())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Factory function to create the document repository selected by configuration
pub fn create_document_repository(
    config: &RepositoryConfig,
    postgres_pool: Option<PgPool>,
) -> Result<Arc<dyn DocumentRepository>, AppError> {
    match config.backend {
        RepositoryBackend::Postgres => {
            let pool = postgres_pool.ok_or_else(|| {
                AppError::Internal(
                    "PostgreSQL repository requires a database connection pool".to_string(),
                )
            })?;
            tracing::info!("Initializing PostgreSQL document repository");
            Ok(Arc::new(PostgresDocumentRepository::new(pool)))
        }
        RepositoryBackend::Memory => {
            tracing::info!("Initializing in-memory document repository");
            Ok(Arc::new(InMemoryDocumentRepository::new()))
        }
    }
}
