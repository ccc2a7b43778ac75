use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use docket_core::models::DocumentChangedEvent;
use docket_core::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Soft delete. Deleting an already deleted document succeeds without a new event.
#[utoipa::path(
    delete,
    path = "/api/v1/documents/{id}",
    tag = "documents",
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(document_id = %id, operation = "delete_document"))]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    let mut document = state
        .repository
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound(id.to_string()))?;

    if !document.delete() {
        tracing::debug!("Document already deleted");
        return Ok(StatusCode::NO_CONTENT);
    }

    state.repository.update(&document).await?;

    // The deletion is already durable; workers re-read the record and skip it either way.
    if let Err(e) = state
        .event_bus
        .publisher
        .publish(&DocumentChangedEvent::deleted(id))
        .await
    {
        tracing::error!(error = %e, "Failed to publish document deletion event");
    }

    tracing::info!("Document deleted");
    Ok(StatusCode::NO_CONTENT)
}
