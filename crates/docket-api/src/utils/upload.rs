//! Upload form parsing and per-file validation.

use axum::extract::multipart::{Field, Multipart};
use docket_core::{AppError, UploadPolicy};
use serde::Deserialize;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;

use crate::services::upload::{FileContent, IncomingFile, UploadMetadata};

const MAX_FILENAME_LENGTH: usize = 255;

/// Optional JSON `metadata` part.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FormMetadata {
    tags: Vec<String>,
    assigned_to: Vec<String>,
    uploaded_by: Option<String>,
}

pub fn validate_batch_size(count: usize, max_files: usize) -> Result<(), AppError> {
    if count == 0 {
        return Err(AppError::InvalidInput("No files provided".to_string()));
    }
    if count > max_files {
        return Err(AppError::InvalidInput(format!(
            "Maximum {} files allowed per upload",
            max_files
        )));
    }
    Ok(())
}

pub fn validate_file_size(file_name: &str, size: u64, max_size: usize) -> Result<(), AppError> {
    if size > max_size as u64 {
        return Err(AppError::PayloadTooLarge(format!(
            "File '{}' exceeds maximum size of {} MB",
            file_name,
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Returns the lowercased extension when it is allowed.
pub fn validate_file_extension(
    file_name: &str,
    allowed_extensions: &[String],
) -> Result<String, AppError> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if extension.is_empty() || !allowed_extensions.contains(&extension) {
        let allowed: Vec<String> = allowed_extensions
            .iter()
            .map(|e| format!(".{}", e))
            .collect();
        return Err(AppError::InvalidInput(format!(
            "File '{}' has unsupported format. Allowed: {}",
            file_name,
            allowed.join(", ")
        )));
    }

    Ok(extension)
}

/// Strip MIME parameters ("image/jpeg; charset=utf-8" -> "image/jpeg") and lowercase.
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

pub fn validate_content_type(
    file_name: &str,
    content_type: &str,
    allowed_types: &[String],
) -> Result<(), AppError> {
    let normalized = normalize_mime_type(content_type);
    if !allowed_types.iter().any(|ct| normalized == *ct) {
        return Err(AppError::InvalidInput(format!(
            "File '{}' has unsupported MIME type '{}'",
            file_name, content_type
        )));
    }
    Ok(())
}

/// Every per-file rule of `policy`, in the order clients see them reported.
pub fn validate_file(file: &IncomingFile, policy: &UploadPolicy) -> Result<(), AppError> {
    validate_file_size(&file.file_name, file.size, policy.max_file_size_bytes)?;
    validate_file_extension(&file.file_name, &policy.allowed_extensions)?;
    validate_content_type(
        &file.file_name,
        &file.content_type,
        &policy.allowed_content_types,
    )
}

/// Reduce a client-supplied name to its final path component.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::InvalidInput(format!(
            "Invalid file name '{}'",
            filename
        )));
    }

    Ok(name.chars().take(MAX_FILENAME_LENGTH).collect())
}

/// Comma-separated labels, trimmed, empties dropped. Case is preserved.
pub fn split_labels(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Read an upload form: repeated `files` parts plus optional `tags`, `assignedTo`,
/// `uploadedBy` and a JSON `metadata` part.
///
/// File parts are spooled to temporary files. Format, count and size are checked as
/// parts arrive so an oversize file is rejected without reading the rest of it.
pub async fn extract_upload_form(
    mut multipart: Multipart,
    policy: &UploadPolicy,
) -> Result<(Vec<IncomingFile>, UploadMetadata), AppError> {
    let mut files = Vec::new();
    let mut metadata = UploadMetadata::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            "files" | "file" => {
                validate_batch_size(files.len() + 1, policy.max_batch_files)?;

                let file_name = sanitize_filename(field.file_name().unwrap_or("unknown"))?;
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                validate_file_extension(&file_name, &policy.allowed_extensions)?;
                validate_content_type(&file_name, &content_type, &policy.allowed_content_types)?;

                let (path, size) =
                    spool_field(field, &file_name, policy.max_file_size_bytes).await?;
                files.push(IncomingFile {
                    file_name,
                    content_type,
                    size,
                    content: FileContent::Spooled(path),
                });
            }
            "tags" => metadata.tags.extend(split_labels(&read_text(field).await?)),
            "assignedTo" | "assigned_to" => metadata
                .assigned_to
                .extend(split_labels(&read_text(field).await?)),
            "uploadedBy" | "uploaded_by" => {
                let value = read_text(field).await?;
                if !value.trim().is_empty() {
                    metadata.uploaded_by = Some(value.trim().to_string());
                }
            }
            "metadata" => {
                let parsed: FormMetadata = serde_json::from_str(&read_text(field).await?)
                    .map_err(|e| AppError::InvalidInput(format!("Invalid metadata: {}", e)))?;
                metadata.tags.extend(parsed.tags);
                metadata.assigned_to.extend(parsed.assigned_to);
                if parsed.uploaded_by.is_some() {
                    metadata.uploaded_by = parsed.uploaded_by;
                }
            }
            other => tracing::debug!(field = %other, "Ignoring unknown upload form field"),
        }
    }

    validate_batch_size(files.len(), policy.max_batch_files)?;
    Ok((files, metadata))
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read form field: {}", e)))
}

async fn spool_field(
    mut field: Field<'_>,
    file_name: &str,
    max_size: usize,
) -> Result<(TempPath, u64), AppError> {
    let (file, path) = NamedTempFile::new()?.into_parts();
    let mut file = tokio::fs::File::from_std(file);
    let mut size: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?
    {
        size += chunk.len() as u64;
        validate_file_size(file_name, size, max_size)?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok((path, size))
}
