use crate::constants::SIGNED_URL_TTL_SECS;
use crate::error::{storage_error, ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Response, StatusCode},
    response::{IntoResponse, Redirect},
};
use docket_core::AppError;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct DownloadQuery {
    /// Redirect to a short-lived signed URL instead of proxying the bytes.
    #[serde(default)]
    pub redirect: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}/download",
    tag = "documents",
    params(
        ("id" = Uuid, Path, description = "Document ID"),
        DownloadQuery
    ),
    responses(
        (status = 200, description = "Document file", content_type = "application/octet-stream"),
        (status = 307, description = "Redirect to a signed URL"),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(document_id = %id, operation = "download_document"))]
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> Result<axum::response::Response, HttpAppError> {
    let document = state
        .repository
        .get_by_id(id)
        .await?
        .filter(|d| !d.is_deleted())
        .ok_or_else(|| AppError::DocumentNotFound(id.to_string()))?;

    let uri = document.storage_uri().ok_or_else(|| {
        AppError::InvalidState(format!("Document '{}' has no stored bytes", id))
    })?;
    let storage_key = state.storage.key_from_uri(uri)?;

    if query.redirect {
        let url = state
            .storage
            .get_signed_url(&storage_key, Duration::from_secs(SIGNED_URL_TTL_SECS))
            .await
            .map_err(storage_error)?;
        return Ok(Redirect::temporary(&url).into_response());
    }

    tracing::debug!(storage_key = %storage_key, "Proxying document from storage");

    let stream = state
        .storage
        .download_stream(&storage_key)
        .await
        .map_err(storage_error)?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let content_disposition = format!(
        "attachment; filename=\"{}\"",
        document.file_name().replace('"', "")
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, document.mime_type())
        .header(header::CONTENT_DISPOSITION, content_disposition.as_str())
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}
