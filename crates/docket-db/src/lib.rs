//! Docket database layer
//!
//! Document persistence behind the [`DocumentRepository`] contract, with a PostgreSQL
//! implementation for deployments and an in-memory one for tests and single-process runs.

pub mod db;

pub use db::{
    create_document_repository, DocumentRepository, InMemoryDocumentRepository,
    PostgresDocumentRepository,
};
