//! Upload orchestration: validate a whole batch, then store, persist and announce each
//! file in turn.

mod service;
mod types;

pub use service::UploadOrchestrator;
pub use types::{
    FileContent, IncomingFile, UploadFailure, UploadMetadata, UploadResponse, UploadedDocument,
};
