//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; anything that converts into
//! `AppError` renders through here with a consistent status, body and log level.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docket_core::{AppError, ErrorMetadata, LogLevel};
use docket_storage::StorageError;
use std::sync::atomic::{AtomicBool, Ordering};

pub use docket_infra::ErrorResponse;

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from docket-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(storage_error(err))
    }
}

/// Map a storage failure into the application error space.
pub fn storage_error(err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(key) => AppError::NotFound(format!("Stored object '{}' not found", key)),
        StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
        other => AppError::Storage(other.to_string()),
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

static PRODUCTION_MODE: AtomicBool = AtomicBool::new(false);

/// Set once from [`docket_core::Config::is_production`] when the router is built.
pub fn set_production_mode(production: bool) {
    PRODUCTION_MODE.store(production, Ordering::Relaxed);
}

/// Body for `error`. Details are hidden in production and for sensitive errors.
pub fn error_body(error: &AppError) -> ErrorResponse {
    build_error_body(error, PRODUCTION_MODE.load(Ordering::Relaxed))
}

fn build_error_body(error: &AppError, production: bool) -> ErrorResponse {
    let show_details = !production && !error.is_sensitive();
    ErrorResponse {
        error: error.client_message(),
        details: show_details.then(|| error.detailed_message()),
        error_type: show_details.then(|| error.error_type().to_string()),
        code: error.error_code().to_string(),
        recoverable: error.is_recoverable(),
        suggested_action: error.suggested_action().map(String::from),
    }
}

pub fn status_of(error: &AppError) -> StatusCode {
    StatusCode::from_u16(error.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        log_error(app_error);
        (status_of(app_error), Json(error_body(app_error))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mapping() {
        assert!(matches!(
            storage_error(StorageError::NotFound("k".to_string())),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            storage_error(StorageError::InvalidKey("k".to_string())),
            AppError::InvalidInput(_)
        ));
        assert!(matches!(
            storage_error(StorageError::UploadFailed("boom".to_string())),
            AppError::Storage(_)
        ));
    }

    #[test]
    fn test_not_found_response() {
        let response =
            HttpAppError(AppError::DocumentNotFound("abc".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = error_body(&AppError::DocumentNotFound("abc".to_string()));
        assert_eq!(body.code, "DOCUMENT_NOT_FOUND");
        assert_eq!(body.error, "Document with ID 'abc' not found");
    }

    #[test]
    fn test_details_hidden_in_production() {
        let error = AppError::InvalidInput("No files provided".to_string());

        let development = build_error_body(&error, false);
        assert!(development.details.is_some());
        assert!(development.error_type.is_some());

        let production = build_error_body(&error, true);
        assert!(production.details.is_none());
        assert!(production.error_type.is_none());
        assert_eq!(production.error, development.error);
        assert_eq!(production.code, "INVALID_REQUEST");
    }
}
