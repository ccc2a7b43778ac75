use crate::constants::API_PREFIX;
use crate::error::{error_body, status_of, ErrorResponse, HttpAppError};
use crate::services::upload::{UploadFailure, UploadOrchestrator, UploadResponse, UploadedDocument};
use crate::utils::upload::extract_upload_form;
use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Body of a batch that failed after some documents were already stored.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartialUploadResponse {
    #[serde(flatten)]
    pub error: ErrorResponse,
    pub upload_id: Uuid,
    /// Documents stored before the failure. They stay in the pipeline.
    pub documents: Vec<UploadedDocument>,
}

impl IntoResponse for UploadFailure {
    fn into_response(self) -> Response {
        if self.committed.is_empty() {
            return HttpAppError(self.error).into_response();
        }

        tracing::error!(
            error = %self.error,
            upload_id = %self.upload_id,
            committed = self.committed.len(),
            "Upload batch partially stored"
        );
        let status = status_of(&self.error);
        let body = PartialUploadResponse {
            error: error_body(&self.error),
            upload_id: self.upload_id,
            documents: self.committed,
        };
        (status, Json(body)).into_response()
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/documents",
    tag = "documents",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Documents uploaded", body = UploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Batch stopped part way", body = PartialUploadResponse),
        (status = 503, description = "Event bus unavailable", body = PartialUploadResponse)
    )
)]
pub async fn upload_documents(
    State(orchestrator): State<UploadOrchestrator>,
    multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let (files, metadata) = extract_upload_form(multipart, orchestrator.policy()).await?;

    match orchestrator.upload(files, metadata).await {
        Ok(response) => {
            let mut http_response = (StatusCode::CREATED, Json(&response)).into_response();
            if let [single] = response.documents.as_slice() {
                let location = format!("{}/documents/{}", API_PREFIX, single.id);
                if let Ok(value) = location.parse() {
                    http_response.headers_mut().insert(header::LOCATION, value);
                }
            }
            Ok(http_response)
        }
        Err(failure) => Ok(failure.into_response()),
    }
}
