//! Settings resolution and generation lifecycle for the local-first chat
//! engine.
//!
//! This crate provides [`ChatState`], which coordinates chats, the three
//! settings tiers and concurrent streaming generations over pluggable
//! [`ChatProvider`](chat_core::ChatProvider) backends.
//!
//! # Features
//!
//! - Three-tier settings resolution (Chat > Group > Global) with per-field
//!   provenance, recomputed on every read
//! - Concurrent streaming generations, one per chat, with cooperative abort
//! - Branching message trees with version switching and chat forking
//! - Attachment persistence-tier management with backend-switch rescue
//! - One-time elevated storage-quota request per process
//!
//! # Architecture
//!
//! ```text
//! UI action (send, move chat, edit settings)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CHAT STATE                           │
//! │                                                             │
//! │  1. Resolve settings (Chat > Group > Global), at call time  │
//! │         ↓                                                   │
//! │  2. Append user node, advance the active leaf               │
//! │         ↓                                                   │
//! │  3. Register generation (the UI's streaming signal)         │
//! │         ↓                                                   │
//! │  4. Stream provider chunks into the assistant node          │
//! │         ↓                                                   │
//! │  5. Unregister, title + persist + one-time quota request    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chat_core::EndpointType;
//! use chat_state::{ChatState, MemoryStorage, ProviderRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_state::StateError> {
//!     let providers = ProviderRegistry::new()
//!         .with(EndpointType::OpenAiCompatible, Arc::new(my_provider));
//!     let state = ChatState::new(Arc::new(MemoryStorage::new()), providers).await;
//!
//!     state.settings().update(|s| {
//!         s.endpoint_url = "http://localhost:8080".to_string();
//!         s.default_model = Some("llama-3.3-70b".to_string());
//!     }).await;
//!
//!     let chat = state.create_chat().await;
//!     let outcome = state.send_message(chat, "Hello!", None, Vec::new()).await?;
//!     println!("assistant said: {:?}", state.chat(chat).unwrap()
//!         .tree.get(outcome.assistant_message).unwrap().content);
//!     Ok(())
//! }
//! ```

mod attachments;
mod directory;
mod error;
mod generation;
mod lock;
mod resolver;
mod state;
mod storage;
mod store;

pub use attachments::{classify_new_attachment, rescue_on_backend_switch};
pub use directory::{HierarchyDirectory, SidebarEntry};
pub use error::StateError;
pub use generation::GenerationRegistry;
pub use resolver::{resolve, resolve_inherited, ResolvedSettings, SettingsSources, SettingsTier};
pub use state::{ChatState, NewAttachment, ProviderRegistry, SendOutcome};
pub use storage::{ChatStorage, MemoryStorage, StorageError};
pub use store::SettingsStore;

// Re-export commonly used types from chat-core
pub use chat_core::{Chat, ChatGroup, ChatId, GroupId, MessageId};
