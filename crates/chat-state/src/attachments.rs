//! Attachment persistence-tier management.
//!
//! New attachments go straight to durable storage when the active backend
//! can hold binaries; otherwise they stay memory-held until a capable
//! backend shows up and [`rescue_on_backend_switch`] migrates them. The
//! transition is one-way by construction (see [`Attachment`]).

use chat_core::{Attachment, AttachmentMeta, Chat};
use tracing::{debug, warn};

use crate::storage::ChatStorage;

/// Classify and, when possible, immediately persist a new attachment.
///
/// Returns `Persisted` (metadata only) when the backend accepted the blob,
/// `Memory` otherwise. A failed write degrades to `Memory` instead of
/// failing the message send.
pub async fn classify_new_attachment(
    storage: &dyn ChatStorage,
    name: &str,
    mime: &str,
    data: Vec<u8>,
) -> Attachment {
    let meta = AttachmentMeta::new(name, mime, data.len());
    if !storage.can_persist_binary() {
        return Attachment::Memory { meta, data };
    }

    match storage.save_blob(meta.id, &meta.name, &data).await {
        Ok(()) => {
            debug!("attachment {} persisted on arrival", meta.id);
            Attachment::Persisted { meta }
        }
        Err(err) => {
            warn!("failed to persist attachment {}: {}", meta.id, err);
            Attachment::Memory { meta, data }
        }
    }
}

/// Migrate every memory-held attachment in a chat to the given backend.
///
/// Each record is replaced in place with a `Persisted` record carrying the
/// same metadata, so order within the attachments list is preserved.
/// Idempotent: already-persisted attachments are skipped, and a second run
/// finds nothing left to do. Returns the number of attachments migrated.
pub async fn rescue_on_backend_switch(storage: &dyn ChatStorage, chat: &mut Chat) -> usize {
    if !storage.can_persist_binary() {
        return 0;
    }

    let mut rescued = 0;
    for node in chat.tree.nodes_mut() {
        for attachment in node.attachments.iter_mut() {
            let replacement = match &*attachment {
                Attachment::Memory { meta, data } => {
                    match storage.save_blob(meta.id, &meta.name, data).await {
                        Ok(()) => Some(Attachment::persisted(meta.clone())),
                        Err(err) => {
                            warn!("failed to rescue attachment {}: {}", meta.id, err);
                            None
                        }
                    }
                }
                Attachment::Persisted { .. } => None,
            };
            if let Some(persisted) = replacement {
                *attachment = persisted;
                rescued += 1;
            }
        }
    }
    rescued
}

/// Copy the attachment records of `from` onto the matching nodes of `into`.
///
/// Used after a rescue ran on a snapshot: only attachment lists move over,
/// so content streamed into the live chat in the meantime is untouched.
pub(crate) fn sync_attachment_records(from: &Chat, into: &mut Chat) {
    for node in from.tree.nodes() {
        if node.attachments.is_empty() {
            continue;
        }
        if let Some(live) = into.tree.get_mut(node.id) {
            live.attachments = node.attachments.clone();
        }
    }
}
