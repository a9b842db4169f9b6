//! Binary attachments on messages.
//!
//! An attachment is either still held in memory or persisted to durable
//! storage. The transition is one-way: the [`Attachment`] union has no
//! constructor or method that turns a persisted record back into a memory
//! one, so monotonicity holds structurally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an attachment; also the key of its blob in durable storage.
pub type AttachmentId = Uuid;

/// Metadata shared by both attachment states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub id: AttachmentId,
    pub name: String,
    pub mime: String,
    pub size: usize,
    pub timestamp: DateTime<Utc>,
}

impl AttachmentMeta {
    /// Create metadata for a new attachment of the given size.
    pub fn new(name: impl Into<String>, mime: impl Into<String>, size: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mime: mime.into(),
            size,
            timestamp: Utc::now(),
        }
    }
}

/// An attachment, discriminated by where its bytes live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Attachment {
    /// Bytes held in process memory; lost unless rescued to storage.
    Memory {
        #[serde(flatten)]
        meta: AttachmentMeta,
        #[serde(skip)]
        data: Vec<u8>,
    },
    /// Bytes live in durable storage, keyed by the attachment id; only
    /// metadata remains here.
    Persisted {
        #[serde(flatten)]
        meta: AttachmentMeta,
    },
}

impl Attachment {
    /// Create a memory-held attachment from raw bytes.
    pub fn in_memory(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        let meta = AttachmentMeta::new(name, mime, data.len());
        Attachment::Memory { meta, data }
    }

    /// Create a persisted record from existing metadata.
    pub fn persisted(meta: AttachmentMeta) -> Self {
        Attachment::Persisted { meta }
    }

    /// The metadata, regardless of state.
    pub fn meta(&self) -> &AttachmentMeta {
        match self {
            Attachment::Memory { meta, .. } => meta,
            Attachment::Persisted { meta } => meta,
        }
    }

    pub fn id(&self) -> AttachmentId {
        self.meta().id
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Attachment::Persisted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_records_size() {
        let attachment = Attachment::in_memory("photo.png", "image/png", vec![0u8; 512]);
        assert!(!attachment.is_persisted());
        assert_eq!(attachment.meta().size, 512);
        assert_eq!(attachment.meta().name, "photo.png");
    }

    #[test]
    fn test_persisted_keeps_metadata() {
        let original = Attachment::in_memory("doc.pdf", "application/pdf", vec![1, 2, 3]);
        let meta = original.meta().clone();
        let persisted = Attachment::persisted(meta.clone());

        assert!(persisted.is_persisted());
        assert_eq!(persisted.meta(), &meta);
        assert_eq!(persisted.id(), original.id());
    }

    #[test]
    fn test_serde_drops_memory_bytes() {
        // Blob bytes never leak into serialized chat documents; only the
        // persisted form survives a round-trip intact.
        let attachment = Attachment::in_memory("a.bin", "application/octet-stream", vec![9; 64]);
        let json = serde_json::to_string(&attachment).unwrap();
        assert!(!json.contains("data"));

        let back: Attachment = serde_json::from_str(&json).unwrap();
        match back {
            Attachment::Memory { data, meta } => {
                assert!(data.is_empty());
                assert_eq!(meta.size, 64);
            }
            Attachment::Persisted { .. } => panic!("status tag must round-trip"),
        }
    }
}
