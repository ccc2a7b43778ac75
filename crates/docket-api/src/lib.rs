//! Docket API Library
//!
//! HTTP handlers, the upload orchestrator and application setup.

mod api_doc;
pub mod constants;
mod handlers;
pub mod services;
pub mod setup;
mod utils;

pub mod error;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use services::upload::{
    IncomingFile, UploadFailure, UploadMetadata, UploadOrchestrator, UploadResponse,
    UploadedDocument,
};
pub use state::AppState;
