//! Database repositories for data access layer
//
// Document repository contract, PostgreSQL implementation and factory
pub mod document;
//
// Process-local implementation
pub mod memory;

pub use document::{create_document_repository, DocumentRepository, PostgresDocumentRepository};
pub use memory::InMemoryDocumentRepository;
