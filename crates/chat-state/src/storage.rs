//! The storage boundary and an in-memory implementation.
//!
//! The state layer treats persistence as a black box behind [`ChatStorage`].
//! [`MemoryStorage`] is the reference implementation used by tests; real
//! backends (local disk, remote sync) live outside this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chat_core::{AttachmentId, Chat, ChatId, GlobalSettings};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A read failed or returned corrupt data.
    #[error("storage read failed: {0}")]
    Read(String),

    /// A write failed.
    #[error("storage write failed: {0}")]
    Write(String),

    /// The backend is out of space.
    #[error("storage quota exhausted")]
    QuotaExceeded,
}

/// Trait for chat persistence backends.
///
/// `can_persist_binary` gates attachment handling: a backend that cannot
/// store blobs durably makes new attachments stay memory-held until the
/// backend is switched for a capable one.
#[async_trait]
pub trait ChatStorage: Send + Sync {
    /// Load the persisted global settings, if any exist yet.
    async fn load_settings(&self) -> Result<Option<GlobalSettings>, StorageError>;

    /// Persist the global settings.
    async fn save_settings(&self, settings: &GlobalSettings) -> Result<(), StorageError>;

    /// Load a chat document by id.
    async fn load_chat(&self, id: ChatId) -> Result<Option<Chat>, StorageError>;

    /// Persist a chat document.
    async fn save_chat(&self, chat: &Chat) -> Result<(), StorageError>;

    /// Remove a chat document.
    async fn delete_chat(&self, id: ChatId) -> Result<(), StorageError>;

    /// Persist an attachment blob under its id.
    async fn save_blob(&self, id: AttachmentId, name: &str, data: &[u8])
        -> Result<(), StorageError>;

    /// Load an attachment blob by id.
    async fn load_blob(&self, id: AttachmentId) -> Result<Option<Vec<u8>>, StorageError>;

    /// Ask the platform for elevated, eviction-safe storage. Returns whether
    /// the request was granted.
    async fn request_persistent_quota(&self) -> Result<bool, StorageError>;

    /// Whether this backend can durably store binary blobs.
    fn can_persist_binary(&self) -> bool;
}

/// In-memory storage backend.
///
/// Holds everything in maps behind async locks and counts the operations the
/// tests assert on. The binary capability is configurable so both sides of
/// the attachment tier logic can be exercised.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    settings: RwLock<Option<GlobalSettings>>,
    chats: RwLock<HashMap<ChatId, Chat>>,
    blobs: RwLock<HashMap<AttachmentId, Vec<u8>>>,
    binary_capable: bool,
    quota_requests: AtomicUsize,
    chat_saves: AtomicUsize,
}

impl MemoryStorage {
    /// A backend that can persist binary blobs.
    pub fn new() -> Self {
        Self {
            binary_capable: true,
            ..Default::default()
        }
    }

    /// A backend without durable binary storage, like a plain key-value
    /// store capped at small string values.
    pub fn volatile() -> Self {
        Self {
            binary_capable: false,
            ..Default::default()
        }
    }

    /// How many times elevated quota was requested.
    pub fn quota_requests(&self) -> usize {
        self.quota_requests.load(Ordering::SeqCst)
    }

    /// How many chat documents were written.
    pub fn chat_saves(&self) -> usize {
        self.chat_saves.load(Ordering::SeqCst)
    }

    /// Number of stored blobs.
    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl ChatStorage for MemoryStorage {
    async fn load_settings(&self) -> Result<Option<GlobalSettings>, StorageError> {
        Ok(self.settings.read().await.clone())
    }

    async fn save_settings(&self, settings: &GlobalSettings) -> Result<(), StorageError> {
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }

    async fn load_chat(&self, id: ChatId) -> Result<Option<Chat>, StorageError> {
        Ok(self.chats.read().await.get(&id).cloned())
    }

    async fn save_chat(&self, chat: &Chat) -> Result<(), StorageError> {
        self.chat_saves.fetch_add(1, Ordering::SeqCst);
        self.chats.write().await.insert(chat.id, chat.clone());
        Ok(())
    }

    async fn delete_chat(&self, id: ChatId) -> Result<(), StorageError> {
        self.chats.write().await.remove(&id);
        Ok(())
    }

    async fn save_blob(
        &self,
        id: AttachmentId,
        _name: &str,
        data: &[u8],
    ) -> Result<(), StorageError> {
        if !self.binary_capable {
            return Err(StorageError::Write(
                "backend cannot persist binary data".to_string(),
            ));
        }
        self.blobs.write().await.insert(id, data.to_vec());
        Ok(())
    }

    async fn load_blob(&self, id: AttachmentId) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.read().await.get(&id).cloned())
    }

    async fn request_persistent_quota(&self) -> Result<bool, StorageError> {
        self.quota_requests.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn can_persist_binary(&self) -> bool {
        self.binary_capable
    }
}
