use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

/// Topic name used by brokers that route on topics rather than channels.
pub const DOCUMENT_CHANGED_TOPIC: &str = "document-changed";

/// What kind of action produced a change event. Consumers treat it as a hint only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Uploaded,
    Updated,
    Deleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Uploaded => "uploaded",
            ChangeType::Updated => "updated",
            ChangeType::Deleted => "deleted",
        }
    }
}

impl Display for ChangeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Notification that a document may have changed.
///
/// Delivery is at-least-once and unordered; the stored document is always the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChangedEvent {
    pub document_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub change_type: ChangeType,
}

impl DocumentChangedEvent {
    pub fn new(document_id: Uuid, change_type: ChangeType) -> Self {
        Self {
            document_id,
            timestamp: Utc::now(),
            change_type,
        }
    }

    pub fn uploaded(document_id: Uuid) -> Self {
        Self::new(document_id, ChangeType::Uploaded)
    }

    pub fn updated(document_id: Uuid) -> Self {
        Self::new(document_id, ChangeType::Updated)
    }

    pub fn deleted(document_id: Uuid) -> Self {
        Self::new(document_id, ChangeType::Deleted)
    }

    /// Message attributes for brokers that support headers alongside the payload.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("documentId", self.document_id.to_string()),
            ("changeType", self.change_type.to_string()),
            ("timestamp", self.timestamp.to_rfc3339()),
        ]
    }
}
