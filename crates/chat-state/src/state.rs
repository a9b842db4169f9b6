//! The chat state facade: chats, settings resolution and the generation
//! lifecycle behind one explicitly constructed object.
//!
//! All tree and directory mutation is synchronous; the provider call is the
//! only suspension point in a generation. Chunk application locks the chat
//! map briefly and touches a single node exclusive to that generation, so
//! any number of chats can stream concurrently without write conflicts.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chat_core::{
    Chat, ChatId, ChatMessage, ChatProvider, ChatRequest, ChunkSink, EndpointType, GroupId,
    MessageId, MessageRole, MessageTree,
};
use tracing::{info, warn};

use crate::attachments::{
    classify_new_attachment, rescue_on_backend_switch, sync_attachment_records,
};
use crate::directory::{HierarchyDirectory, SidebarEntry};
use crate::error::StateError;
use crate::generation::GenerationRegistry;
use crate::lock;
use crate::resolver::{self, ResolvedSettings};
use crate::storage::ChatStorage;
use crate::store::SettingsStore;

/// Longest derived chat title, in characters.
const MAX_DERIVED_TITLE_CHARS: usize = 48;

/// Raw bytes for an attachment arriving with a message.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

impl NewAttachment {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data,
        }
    }
}

/// What a settled `send_message` produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub user_message: MessageId,
    pub assistant_message: MessageId,
    /// True when the generation was aborted; partial content is kept.
    pub aborted: bool,
}

/// Providers keyed by the endpoint type they serve.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<EndpointType, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with(mut self, kind: EndpointType, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    pub fn register(&mut self, kind: EndpointType, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(kind, provider);
    }

    pub fn get(&self, kind: EndpointType) -> Option<Arc<dyn ChatProvider>> {
        self.providers.get(&kind).cloned()
    }
}

/// Loaded chats behind a shared lock, cloneable into chunk sinks.
#[derive(Clone, Default)]
struct SharedChats {
    inner: Arc<RwLock<HashMap<ChatId, Chat>>>,
}

impl SharedChats {
    fn with<R>(&self, f: impl FnOnce(&HashMap<ChatId, Chat>) -> R) -> R {
        f(&lock::read(&self.inner))
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut HashMap<ChatId, Chat>) -> R) -> R {
        f(&mut lock::write(&self.inner))
    }

    fn get_clone(&self, id: ChatId) -> Option<Chat> {
        self.with(|chats| chats.get(&id).cloned())
    }

    /// Append a streamed chunk to one node. Quietly drops the chunk when the
    /// chat was deleted mid-stream.
    fn append_content(&self, chat: ChatId, node: MessageId, chunk: &str) {
        self.with_mut(|chats| {
            if let Some(chat) = chats.get_mut(&chat) {
                chat.tree.append_content(node, chunk);
            }
        });
    }
}

/// The facade the UI layer talks to.
pub struct ChatState {
    storage: RwLock<Arc<dyn ChatStorage>>,
    settings: SettingsStore,
    providers: ProviderRegistry,
    chats: SharedChats,
    directory: RwLock<HierarchyDirectory>,
    registry: GenerationRegistry,
    current: RwLock<Option<ChatId>>,
    /// One elevated-quota request per process; flipped before the await so
    /// two concurrent first completions cannot both fire it.
    quota_requested: AtomicBool,
    /// Chats with post-completion bookkeeping (title, persist) in flight.
    tasks: Mutex<HashSet<ChatId>>,
}

impl ChatState {
    /// Construct the state over a storage backend and a provider registry.
    pub async fn new(storage: Arc<dyn ChatStorage>, providers: ProviderRegistry) -> Self {
        let settings = SettingsStore::load(storage.clone()).await;
        Self {
            storage: RwLock::new(storage),
            settings,
            providers,
            chats: SharedChats::default(),
            directory: RwLock::new(HierarchyDirectory::new()),
            registry: GenerationRegistry::new(),
            current: RwLock::new(None),
            quota_requested: AtomicBool::new(false),
            tasks: Mutex::new(HashSet::new()),
        }
    }

    /// The settings store (global tier).
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    // ---- chat management ----------------------------------------------

    /// Create an empty ungrouped chat, select it and return its id.
    pub async fn create_chat(&self) -> ChatId {
        let chat = Chat::new();
        let id = chat.id;
        self.chats.with_mut(|chats| {
            chats.insert(id, chat);
        });
        lock::write(&self.directory).register_chat(id, None);
        *lock::write(&self.current) = Some(id);
        self.persist_chat(id).await;
        id
    }

    /// Select a chat, loading it from storage when it is not in memory yet.
    pub async fn open_chat(&self, id: ChatId) -> Result<(), StateError> {
        let loaded = self.chats.with(|chats| chats.contains_key(&id));
        if !loaded {
            let storage = self.storage_handle();
            let chat = storage
                .load_chat(id)
                .await?
                .ok_or(StateError::ChatNotFound(id))?;
            let group = chat.group_id;
            self.chats.with_mut(|chats| {
                chats.insert(id, chat);
            });
            lock::write(&self.directory).register_chat(id, group);
        }
        *lock::write(&self.current) = Some(id);
        Ok(())
    }

    /// Delete a chat outright, aborting any generation it still runs.
    pub async fn delete_chat(&self, id: ChatId) -> Result<(), StateError> {
        self.registry.abort(id);
        let existed = self.chats.with_mut(|chats| chats.remove(&id).is_some());
        if !existed {
            return Err(StateError::ChatNotFound(id));
        }
        lock::write(&self.directory).remove_chat(id);
        {
            let mut current = lock::write(&self.current);
            if *current == Some(id) {
                *current = None;
            }
        }
        self.storage_handle().delete_chat(id).await?;
        Ok(())
    }

    /// The currently selected chat, if any.
    pub fn current_chat(&self) -> Option<ChatId> {
        *lock::read(&self.current)
    }

    /// A snapshot of a loaded chat.
    pub fn chat(&self, id: ChatId) -> Option<Chat> {
        self.chats.get_clone(id)
    }

    /// The flattened active path of a chat, root to current leaf.
    pub fn active_messages(&self, id: ChatId) -> Result<Vec<ChatMessage>, StateError> {
        self.chats.with(|chats| {
            let chat = chats.get(&id).ok_or(StateError::ChatNotFound(id))?;
            Ok(chat.tree.flatten_path(chat.current_leaf))
        })
    }

    // ---- streaming predicates -----------------------------------------

    /// Whether a generation is streaming for this chat.
    pub fn streaming(&self, id: ChatId) -> bool {
        self.registry.is_active(id)
    }

    /// Alias of [`streaming`]: the UI's typing indicator.
    ///
    /// [`streaming`]: ChatState::streaming
    pub fn is_processing(&self, id: ChatId) -> bool {
        self.registry.is_active(id)
    }

    /// Streaming or running post-completion bookkeeping.
    pub fn is_task_running(&self, id: ChatId) -> bool {
        self.registry.is_active(id) || lock::lock(&self.tasks).contains(&id)
    }

    /// Ids of all chats with a generation in flight.
    pub fn active_generations(&self) -> Vec<ChatId> {
        self.registry.active_chats()
    }

    // ---- settings resolution ------------------------------------------

    /// The effective configuration for a chat, resolved from all three
    /// tiers at this instant.
    pub fn resolved_settings(&self, id: ChatId) -> Result<ResolvedSettings, StateError> {
        self.resolve_for(id, true)
    }

    /// What the chat would get without its own overrides.
    pub fn inherited_settings(&self, id: ChatId) -> Result<ResolvedSettings, StateError> {
        self.resolve_for(id, false)
    }

    fn resolve_for(&self, id: ChatId, with_chat_tier: bool) -> Result<ResolvedSettings, StateError> {
        let global = self.settings.get();
        self.chats.with(|chats| {
            let chat = chats.get(&id).ok_or(StateError::ChatNotFound(id))?;
            let directory = lock::read(&self.directory);
            let group = chat
                .group_id
                .and_then(|gid| directory.group(gid))
                .map(|g| g.overrides.clone());
            let chat_tier = with_chat_tier.then(|| chat.overrides.clone());
            Ok(resolver::resolve(
                &global,
                group.as_ref(),
                chat_tier.as_ref(),
            ))
        })
    }

    // ---- generation lifecycle -----------------------------------------

    /// Send a user message and stream the assistant's reply into the tree.
    ///
    /// Settings are resolved here, at call time; edits made to any tier
    /// after this point only affect generations not yet started. The
    /// registry entry is cleared on every path once the provider call
    /// settles, and an abort surfaces as a clean `aborted` outcome rather
    /// than an error.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parent: Option<MessageId>,
        attachments: Vec<NewAttachment>,
    ) -> Result<SendOutcome, StateError> {
        let resolved = self.resolved_settings(chat_id)?;
        let provider = self.providers.get(resolved.endpoint_type).ok_or_else(|| {
            StateError::Configuration(format!(
                "no provider registered for endpoint type {:?}",
                resolved.endpoint_type
            ))
        })?;
        if resolved.endpoint_type != EndpointType::InProcess
            && resolved.endpoint_url.trim().is_empty()
        {
            return Err(StateError::Configuration(
                "no endpoint URL configured".to_string(),
            ));
        }
        let model = resolved
            .model
            .clone()
            .ok_or_else(|| StateError::Configuration("no model selected".to_string()))?;

        // Registering is also the double-send guard: one generation per chat.
        let token = self.registry.begin(chat_id)?;

        let storage = self.storage_handle();
        let mut classified = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            classified.push(
                classify_new_attachment(
                    storage.as_ref(),
                    &attachment.name,
                    &attachment.mime,
                    attachment.data,
                )
                .await,
            );
        }

        let prepared = self.chats.with_mut(|chats| {
            let chat = chats
                .get_mut(&chat_id)
                .ok_or(StateError::ChatNotFound(chat_id))?;
            let parent_id = parent.unwrap_or(chat.current_leaf);
            let user_id = chat
                .tree
                .add_child(parent_id, MessageRole::User, text, classified)
                .ok_or(StateError::MessageNotFound(parent_id))?;
            chat.current_leaf = user_id;

            let mut messages: Vec<ChatMessage> = resolved
                .system_prompt_segments
                .iter()
                .map(|segment| ChatMessage::system(segment.clone()))
                .collect();
            messages.extend(chat.tree.flatten_path(user_id));

            let assistant_id = chat
                .tree
                .add_child(user_id, MessageRole::Assistant, "", Vec::new())
                .ok_or(StateError::MessageNotFound(user_id))?;
            chat.current_leaf = assistant_id;
            chat.touch();
            Ok((user_id, assistant_id, messages))
        });
        let (user_id, assistant_id, messages) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.registry.finish(chat_id);
                return Err(err);
            }
        };

        info!(
            "starting generation for chat {} via {} (model: {})",
            chat_id,
            provider.name(),
            model
        );

        let sink_chats = self.chats.clone();
        let on_chunk: ChunkSink = Arc::new(move |chunk: &str| {
            sink_chats.append_content(chat_id, assistant_id, chunk);
        });

        let request = ChatRequest {
            messages,
            model,
            endpoint_url: resolved.endpoint_url.clone(),
            headers: resolved.endpoint_headers.clone(),
            parameters: resolved.lm_parameters.clone(),
        };

        let result = provider.chat(request, on_chunk, token.clone()).await;

        // Bookkeeping runs on every outcome: the entry never outlives the call.
        self.registry.finish(chat_id);

        let outcome = SendOutcome {
            user_message: user_id,
            assistant_message: assistant_id,
            aborted: false,
        };
        match result {
            Ok(()) => {
                self.finish_generation(chat_id).await;
                Ok(outcome)
            }
            Err(err) if err.is_cancelled() || token.is_cancelled() => {
                info!(
                    "generation for chat {} aborted, partial content kept",
                    chat_id
                );
                self.persist_chat(chat_id).await;
                Ok(SendOutcome {
                    aborted: true,
                    ..outcome
                })
            }
            Err(err) => {
                warn!("generation for chat {} failed: {}", chat_id, err);
                self.persist_chat(chat_id).await;
                Err(StateError::Provider(err))
            }
        }
    }

    /// Fire the cancellation token of this chat's generation, if any.
    ///
    /// Safe to call repeatedly and after the generation already settled.
    pub fn abort_chat(&self, chat_id: ChatId) -> bool {
        self.registry.abort(chat_id)
    }

    /// Fork a chat at a message: the root-to-message path is copied into a
    /// fresh ungrouped chat that shares no structure with the source.
    pub async fn fork_chat(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<ChatId, StateError> {
        let fork = self.chats.with(|chats| {
            let source = chats.get(&chat_id).ok_or(StateError::ChatNotFound(chat_id))?;
            let (tree, leaf) = source
                .tree
                .copy_path_prefix(message_id)
                .ok_or(StateError::MessageNotFound(message_id))?;
            Ok::<_, StateError>(Chat::forked_from(source, tree, leaf))
        })?;
        let fork_id = fork.id;
        self.chats.with_mut(|chats| {
            chats.insert(fork_id, fork);
        });
        lock::write(&self.directory).register_chat(fork_id, None);
        self.persist_chat(fork_id).await;
        info!("forked chat {} from {}", fork_id, chat_id);
        Ok(fork_id)
    }

    /// Edit a message by branching: a sibling node with the new text is
    /// appended next to the original and becomes the active leaf. History
    /// is never rewritten.
    pub async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        new_text: &str,
    ) -> Result<MessageId, StateError> {
        let new_id = self.chats.with_mut(|chats| {
            let chat = chats
                .get_mut(&chat_id)
                .ok_or(StateError::ChatNotFound(chat_id))?;
            let node = chat
                .tree
                .get(message_id)
                .ok_or(StateError::MessageNotFound(message_id))?;
            let parent = node.parent.ok_or(StateError::MessageNotFound(message_id))?;
            let role = node.role;
            let attachments = node.attachments.clone();
            let new_id = chat
                .tree
                .add_child(parent, role, new_text, attachments)
                .ok_or(StateError::MessageNotFound(parent))?;
            chat.current_leaf = new_id;
            chat.touch();
            Ok::<_, StateError>(new_id)
        })?;
        self.persist_chat(chat_id).await;
        Ok(new_id)
    }

    /// Switch the active path to another sibling version: the leaf moves to
    /// the newest continuation under `message_id`. No branch is deleted.
    pub async fn switch_version(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), StateError> {
        self.chats.with_mut(|chats| {
            let chat = chats
                .get_mut(&chat_id)
                .ok_or(StateError::ChatNotFound(chat_id))?;
            let leaf = chat
                .tree
                .deepest_descendant(message_id)
                .ok_or(StateError::MessageNotFound(message_id))?;
            chat.current_leaf = leaf;
            chat.touch();
            Ok::<_, StateError>(())
        })?;
        self.persist_chat(chat_id).await;
        Ok(())
    }

    /// Set or clear the chat-tier model override.
    pub async fn update_chat_model(
        &self,
        chat_id: ChatId,
        model: Option<String>,
    ) -> Result<(), StateError> {
        self.update_chat_overrides(chat_id, |overrides| overrides.model = model)
            .await
    }

    /// Patch the chat-tier overrides in place.
    pub async fn update_chat_overrides(
        &self,
        chat_id: ChatId,
        patch: impl FnOnce(&mut chat_core::SettingsOverrides),
    ) -> Result<(), StateError> {
        self.chats.with_mut(|chats| {
            let chat = chats
                .get_mut(&chat_id)
                .ok_or(StateError::ChatNotFound(chat_id))?;
            patch(&mut chat.overrides);
            chat.touch();
            Ok::<_, StateError>(())
        })?;
        self.persist_chat(chat_id).await;
        Ok(())
    }

    // ---- groups --------------------------------------------------------

    /// Create an empty chat group.
    pub fn create_group(&self, name: impl Into<String>) -> GroupId {
        lock::write(&self.directory).create_group(name)
    }

    /// Patch a group's overrides in place.
    pub fn update_group_overrides(
        &self,
        group_id: GroupId,
        patch: impl FnOnce(&mut chat_core::SettingsOverrides),
    ) -> Result<(), StateError> {
        let updated = lock::write(&self.directory).update_group_overrides(group_id, patch);
        if updated {
            Ok(())
        } else {
            Err(StateError::GroupNotFound(group_id))
        }
    }

    /// Move a chat into a group (or out, with `None`) and update its
    /// back-reference.
    pub async fn move_chat_to_group(
        &self,
        chat_id: ChatId,
        group: Option<GroupId>,
    ) -> Result<(), StateError> {
        let known = self.chats.with(|chats| chats.contains_key(&chat_id));
        if !known {
            return Err(StateError::ChatNotFound(chat_id));
        }
        {
            let mut directory = lock::write(&self.directory);
            if let Some(gid) = group {
                if directory.group(gid).is_none() {
                    return Err(StateError::GroupNotFound(gid));
                }
            }
            directory.move_chat_to_group(chat_id, group);
        }
        self.chats.with_mut(|chats| {
            if let Some(chat) = chats.get_mut(&chat_id) {
                chat.group_id = group;
                chat.touch();
            }
        });
        self.persist_chat(chat_id).await;
        Ok(())
    }

    /// Ordered sidebar snapshot for the UI layer.
    pub fn sidebar(&self) -> Vec<SidebarEntry> {
        lock::read(&self.directory).sidebar()
    }

    // ---- providers and storage ----------------------------------------

    /// List models from the endpoint the current chat resolves to, or from
    /// the global endpoint when no chat is selected.
    pub async fn list_models(&self) -> Result<Vec<String>, StateError> {
        let (endpoint_type, url, headers) = match self.current_chat() {
            Some(id) => {
                let resolved = self.resolved_settings(id)?;
                (
                    resolved.endpoint_type,
                    resolved.endpoint_url,
                    resolved.endpoint_headers,
                )
            }
            None => {
                let global = self.settings.get();
                (
                    global.endpoint_type,
                    global.endpoint_url,
                    global.endpoint_headers,
                )
            }
        };
        let provider = self.providers.get(endpoint_type).ok_or_else(|| {
            StateError::Configuration(format!(
                "no provider registered for endpoint type {:?}",
                endpoint_type
            ))
        })?;
        Ok(provider.list_models(&url, &headers).await?)
    }

    /// Swap the storage backend. When the new backend can hold binaries,
    /// every memory-held attachment across loaded chats is rescued into it.
    /// Returns how many attachments were migrated.
    pub async fn switch_storage(&self, new: Arc<dyn ChatStorage>) -> Result<usize, StateError> {
        *lock::write(&self.storage) = new.clone();
        self.settings.set_storage(new.clone()).await;

        if !new.can_persist_binary() {
            return Ok(0);
        }

        let ids: Vec<ChatId> = self.chats.with(|chats| chats.keys().copied().collect());
        let mut rescued_total = 0;
        for id in ids {
            let Some(mut snapshot) = self.chats.get_clone(id) else {
                continue;
            };
            let rescued = rescue_on_backend_switch(new.as_ref(), &mut snapshot).await;
            if rescued > 0 {
                // Only attachment records move back; content streamed into
                // the live chat in the meantime stays untouched.
                self.chats.with_mut(|chats| {
                    if let Some(live) = chats.get_mut(&id) {
                        sync_attachment_records(&snapshot, live);
                    }
                });
                rescued_total += rescued;
            }
            self.persist_chat(id).await;
        }
        if rescued_total > 0 {
            info!("rescued {} attachments to new storage backend", rescued_total);
        }
        Ok(rescued_total)
    }

    // ---- internals -----------------------------------------------------

    fn storage_handle(&self) -> Arc<dyn ChatStorage> {
        lock::read(&self.storage).clone()
    }

    /// Post-completion bookkeeping: title, durable write, one-time quota.
    async fn finish_generation(&self, chat_id: ChatId) {
        self.begin_task(chat_id);

        self.chats.with_mut(|chats| {
            if let Some(chat) = chats.get_mut(&chat_id) {
                if chat.has_default_title() {
                    if let Some(title) = derive_title(&chat.tree) {
                        chat.title = title;
                    }
                }
            }
        });
        self.persist_chat(chat_id).await;

        if !self.quota_requested.swap(true, Ordering::SeqCst) {
            let storage = self.storage_handle();
            match storage.request_persistent_quota().await {
                Ok(granted) => info!("persistent storage quota requested (granted: {})", granted),
                Err(err) => warn!("persistent storage quota request failed: {}", err),
            }
        }

        self.end_task(chat_id);
    }

    /// Durable write of one chat; failure is logged, never fatal.
    async fn persist_chat(&self, chat_id: ChatId) {
        let Some(chat) = self.chats.get_clone(chat_id) else {
            return;
        };
        let storage = self.storage_handle();
        if let Err(err) = storage.save_chat(&chat).await {
            warn!("failed to persist chat {}: {}", chat_id, err);
        }
    }

    fn begin_task(&self, chat_id: ChatId) {
        lock::lock(&self.tasks).insert(chat_id);
    }

    fn end_task(&self, chat_id: ChatId) {
        lock::lock(&self.tasks).remove(&chat_id);
    }
}

/// Derive a title from the first user message of a tree.
fn derive_title(tree: &MessageTree) -> Option<String> {
    let first_user = tree.nodes().find(|node| node.role == MessageRole::User)?;
    let text = first_user.content.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_DERIVED_TITLE_CHARS).collect())
}
