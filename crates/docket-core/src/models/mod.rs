pub mod document;
pub mod event;
pub mod status;

pub use document::{Classification, Document, DocumentDto, DocumentParts, NewDocument};
pub use event::{ChangeType, DocumentChangedEvent, DOCUMENT_CHANGED_TOPIC};
pub use status::{DocumentStatus, STATUS_CODEC_VERSION};
