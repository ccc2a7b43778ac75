//! Types used by the upload orchestrator

use bytes::Bytes;
use chrono::{DateTime, Utc};
use docket_core::models::{Document, DocumentStatus};
use docket_core::AppError;
use serde::Serialize;
use std::pin::Pin;
use tempfile::TempPath;
use tokio::io::AsyncRead;
use utoipa::ToSchema;
use uuid::Uuid;

/// Where a received file's bytes live until they are stored.
pub enum FileContent {
    Memory(Bytes),
    /// Spooled to a temporary file, removed on drop.
    Spooled(TempPath),
}

/// One file of an upload batch, fully received but not yet stored.
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub content: FileContent,
}

impl IncomingFile {
    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size: data.len() as u64,
            content: FileContent::Memory(data),
        }
    }

    pub(crate) async fn reader(&self) -> Result<Pin<Box<dyn AsyncRead + Send + Unpin>>, AppError> {
        match &self.content {
            FileContent::Memory(data) => Ok(Box::pin(std::io::Cursor::new(data.clone()))),
            FileContent::Spooled(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::pin(file))
            }
        }
    }
}

/// Batch-wide labels and attribution.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    pub tags: Vec<String>,
    pub assigned_to: Vec<String>,
    /// Falls back to the policy's default uploader.
    pub uploaded_by: Option<String>,
}

/// Summary of one stored document.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&Document> for UploadedDocument {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id(),
            file_name: document.file_name().to_string(),
            file_size: document.file_size(),
            mime_type: document.mime_type().to_string(),
            status: document.status(),
            uploaded_at: document.uploaded_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Informational only; documents are tracked individually.
    pub upload_id: Uuid,
    pub documents: Vec<UploadedDocument>,
}

/// A batch that stopped part way. `committed` lists the documents that were persisted
/// before `error`; they stay in place and continue through processing.
#[derive(Debug)]
pub struct UploadFailure {
    pub upload_id: Uuid,
    pub committed: Vec<UploadedDocument>,
    pub error: AppError,
}

impl UploadFailure {
    pub fn rejected(upload_id: Uuid, error: AppError) -> Self {
        Self {
            upload_id,
            committed: Vec::new(),
            error,
        }
    }
}
