//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::services::upload;
use docket_core::models;

/// The OpenAPI document served at [`crate::constants::OPENAPI_PATH`].
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Docket API",
        version = "0.1.0",
        description = "Document ingestion API. Uploaded documents are stored, persisted and then classified, OCR'd and data-extracted by independent workers. All endpoints are versioned under /api/v1/."
    ),
    paths(
        handlers::document_upload::upload_documents,
        handlers::document_get::get_document,
        handlers::document_delete::delete_document,
        handlers::document_download::download_document,
        handlers::version::get_version,
    ),
    components(schemas(
        error::ErrorResponse,
        upload::UploadResponse,
        upload::UploadedDocument,
        handlers::document_upload::PartialUploadResponse,
        handlers::version::VersionInfo,
        models::DocumentDto,
        models::DocumentStatus,
        models::Classification,
    )),
    tags(
        (name = "documents", description = "Document upload, retrieval and deletion"),
        (name = "meta", description = "Service metadata")
    )
)]
pub struct ApiDoc;
