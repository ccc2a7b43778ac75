//! Document status and its persisted encoding.
//!
//! Records store the status as a text tag next to the codec version that wrote it.
//! Every variant appears exactly once in [`STATUS_CODEC`]; adding a status means adding
//! a row with a bumped `introduced_in` and bumping [`STATUS_CODEC_VERSION`].

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::AppError;

/// Version of the status encoding written by this build.
pub const STATUS_CODEC_VERSION: i16 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Bytes are on their way to storage; never observed in the repository.
    Uploading,
    Processing,
    Finished,
    Deleted,
}

/// (variant, persisted tag, codec version that introduced it), in declaration order.
const STATUS_CODEC: &[(DocumentStatus, &str, i16)] = &[
    (DocumentStatus::Uploading, "uploading", 1),
    (DocumentStatus::Processing, "processing", 1),
    (DocumentStatus::Finished, "finished", 1),
    (DocumentStatus::Deleted, "deleted", 1),
];

impl DocumentStatus {
    /// Persisted tag for this status.
    pub fn encode(self) -> &'static str {
        STATUS_CODEC[self as usize].1
    }

    /// Decode a persisted tag written by codec version `written_with`.
    ///
    /// Tags are matched case-insensitively so records written with capitalised names
    /// still load. An unknown tag is an error, never a fallback status.
    pub fn decode(tag: &str, written_with: i16) -> Result<Self, AppError> {
        let normalized = tag.trim().to_lowercase();
        if let Some((status, _, _)) = STATUS_CODEC
            .iter()
            .find(|(_, encoded, _)| *encoded == normalized)
        {
            return Ok(*status);
        }

        if written_with > STATUS_CODEC_VERSION {
            Err(AppError::Decode(format!(
                "Document status '{}' was written by codec version {}, this build reads up to {}",
                tag, written_with, STATUS_CODEC_VERSION
            )))
        } else {
            Err(AppError::Decode(format!("Unknown document status '{}'", tag)))
        }
    }

    /// Position in the lifecycle; merges keep the higher rank.
    pub fn rank(self) -> u8 {
        match self {
            DocumentStatus::Uploading => 0,
            DocumentStatus::Processing => 1,
            DocumentStatus::Finished => 2,
            DocumentStatus::Deleted => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == DocumentStatus::Deleted
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Uploading, DocumentStatus::Processing)
                | (DocumentStatus::Uploading, DocumentStatus::Deleted)
                | (DocumentStatus::Processing, DocumentStatus::Finished)
                | (DocumentStatus::Processing, DocumentStatus::Deleted)
                | (DocumentStatus::Finished, DocumentStatus::Deleted)
        )
    }
}

impl Display for DocumentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for DocumentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentStatus::decode(s, STATUS_CODEC_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_table_covers_every_variant_once() {
        for status in [
            DocumentStatus::Uploading,
            DocumentStatus::Processing,
            DocumentStatus::Finished,
            DocumentStatus::Deleted,
        ] {
            let rows = STATUS_CODEC.iter().filter(|(s, _, _)| *s == status).count();
            assert_eq!(rows, 1, "{:?} must appear once", status);
            assert_eq!(
                DocumentStatus::decode(status.encode(), STATUS_CODEC_VERSION).unwrap(),
                status
            );
        }
    }

    #[test]
    fn test_encode_reads_the_codec_table() {
        assert_eq!(STATUS_CODEC.len(), 4);
        for (index, (status, tag, _)) in STATUS_CODEC.iter().enumerate() {
            assert_eq!(*status as usize, index);
            assert_eq!(status.encode(), *tag);
        }
        assert_eq!(DocumentStatus::Finished.to_string(), "finished");
    }

    #[test]
    fn test_decode_accepts_capitalised_tags() {
        assert_eq!(
            DocumentStatus::decode("Processing", 1).unwrap(),
            DocumentStatus::Processing
        );
    }

    #[test]
    fn test_decode_unknown_tag_from_newer_writer() {
        let err = DocumentStatus::decode("archived", STATUS_CODEC_VERSION + 1).unwrap_err();
        match err {
            AppError::Decode(msg) => assert!(msg.contains("codec version 2")),
            other => panic!("Expected Decode, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_tag_same_version() {
        assert!(matches!(
            DocumentStatus::decode("bogus", STATUS_CODEC_VERSION),
            Err(AppError::Decode(_))
        ));
    }

    #[test]
    fn test_deleted_is_absorbing() {
        for next in [
            DocumentStatus::Uploading,
            DocumentStatus::Processing,
            DocumentStatus::Finished,
            DocumentStatus::Deleted,
        ] {
            assert!(!DocumentStatus::Deleted.can_transition_to(next));
        }
        assert!(DocumentStatus::Finished.can_transition_to(DocumentStatus::Deleted));
        assert!(!DocumentStatus::Finished.can_transition_to(DocumentStatus::Processing));
    }
}
