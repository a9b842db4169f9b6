//! End-to-end tests for the generation lifecycle and settings reactivity.

use std::sync::Arc;
use std::time::Duration;

use chat_core::{ChatProvider, EndpointType, MessageRole, SystemPromptOverride};
use chat_state::{
    ChatState, MemoryStorage, NewAttachment, ProviderRegistry, SettingsTier, StateError,
};
use mock_provider::{FailingProvider, ScriptedProvider};

/// Build a state over in-memory storage with one registered provider and a
/// usable global endpoint + model.
async fn state_with(provider: Arc<dyn ChatProvider>) -> (Arc<ChatState>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let providers = ProviderRegistry::new().with(EndpointType::OpenAiCompatible, provider);
    let state = Arc::new(ChatState::new(storage.clone(), providers).await);
    state
        .settings()
        .update(|s| {
            s.endpoint_url = "http://localhost:8080".to_string();
            s.default_model = Some("base-model".to_string());
        })
        .await;
    (state, storage)
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn test_send_message_streams_into_active_path() {
    let provider = Arc::new(ScriptedProvider::new(["Hel", "lo ", "there"]));
    let (state, storage) = state_with(provider.clone()).await;

    let chat = state.create_chat().await;
    let outcome = state
        .send_message(chat, "hi", None, Vec::new())
        .await
        .unwrap();
    assert!(!outcome.aborted);

    let messages = state.active_messages(chat).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, "Hello there");

    assert!(!state.streaming(chat));
    assert!(storage.chat_saves() > 0);
}

#[tokio::test]
async fn test_global_model_change_applies_to_next_send() {
    // Dynamic re-resolution: the chat never pins a model of its own, so a
    // global edit between two sends changes only the second call.
    let provider = Arc::new(ScriptedProvider::new(["ok"]));
    let (state, _) = state_with(provider.clone()).await;
    let chat = state.create_chat().await;

    state.send_message(chat, "one", None, Vec::new()).await.unwrap();
    assert_eq!(provider.requests()[0].model, "base-model");

    state
        .settings()
        .update(|s| s.default_model = Some("updated-model".to_string()))
        .await;

    state.send_message(chat, "two", None, Vec::new()).await.unwrap();
    let requests = provider.requests();
    assert_eq!(requests[0].model, "base-model");
    assert_eq!(requests[1].model, "updated-model");

    // The chat object itself was never mutated into pinning a model
    assert_eq!(state.chat(chat).unwrap().overrides.model, None);
}

#[tokio::test]
async fn test_group_membership_changes_resolution() {
    let provider = Arc::new(ScriptedProvider::new(["ok"]));
    let (state, _) = state_with(provider.clone()).await;
    let chat = state.create_chat().await;

    let group = state.create_group("Work");
    state
        .update_group_overrides(group, |o| o.model = Some("group-model".to_string()))
        .unwrap();

    state.move_chat_to_group(chat, Some(group)).await.unwrap();
    let resolved = state.resolved_settings(chat).unwrap();
    assert_eq!(resolved.model.as_deref(), Some("group-model"));
    assert_eq!(resolved.sources.model, SettingsTier::ChatGroup);

    state.send_message(chat, "grouped", None, Vec::new()).await.unwrap();
    assert_eq!(provider.last_request().unwrap().model, "group-model");

    state.move_chat_to_group(chat, None).await.unwrap();
    state.send_message(chat, "ungrouped", None, Vec::new()).await.unwrap();
    assert_eq!(provider.last_request().unwrap().model, "base-model");
}

#[tokio::test]
async fn test_inherited_settings_preview_revert_target() {
    let provider = Arc::new(ScriptedProvider::new(["ok"]));
    let (state, _) = state_with(provider).await;
    let chat = state.create_chat().await;

    let group = state.create_group("Work");
    state
        .update_group_overrides(group, |o| o.model = Some("group-model".to_string()))
        .unwrap();
    state.move_chat_to_group(chat, Some(group)).await.unwrap();
    state
        .update_chat_model(chat, Some("chat-model".to_string()))
        .await
        .unwrap();

    let resolved = state.resolved_settings(chat).unwrap();
    let inherited = state.inherited_settings(chat).unwrap();
    assert_eq!(resolved.model.as_deref(), Some("chat-model"));
    assert_eq!(inherited.model.as_deref(), Some("group-model"));
}

#[tokio::test]
async fn test_system_prompt_segments_reach_provider() {
    let provider = Arc::new(ScriptedProvider::new(["ok"]));
    let (state, _) = state_with(provider.clone()).await;
    state
        .settings()
        .update(|s| s.system_prompt = "Global Prompt".to_string())
        .await;

    let group = state.create_group("Work");
    state
        .update_group_overrides(group, |o| {
            o.system_prompt = Some(SystemPromptOverride::append("Group Instruction"));
        })
        .unwrap();

    let chat = state.create_chat().await;
    state.move_chat_to_group(chat, Some(group)).await.unwrap();
    state.send_message(chat, "question", None, Vec::new()).await.unwrap();

    let request = provider.last_request().unwrap();
    assert_eq!(request.messages[0].role, MessageRole::System);
    assert_eq!(request.messages[0].content, "Global Prompt");
    assert_eq!(request.messages[1].role, MessageRole::System);
    assert_eq!(request.messages[1].content, "Group Instruction");
    assert_eq!(request.messages[2].role, MessageRole::User);
    assert_eq!(request.messages[2].content, "question");
}

#[tokio::test]
async fn test_fork_shares_no_structure_with_source() {
    let provider = Arc::new(ScriptedProvider::new(["answer"]));
    let (state, _) = state_with(provider).await;
    let chat = state.create_chat().await;

    let outcome = state
        .send_message(chat, "m1", None, Vec::new())
        .await
        .unwrap();

    let fork = state.fork_chat(chat, outcome.assistant_message).await.unwrap();
    assert_ne!(fork, chat);
    assert_eq!(state.chat(fork).unwrap().origin_chat, Some(chat));

    let fork_before = state.active_messages(fork).unwrap();
    assert_eq!(fork_before.len(), 2);
    assert_eq!(fork_before[1].content, "answer");

    // Branch the original and extend it; the fork must not move
    state
        .edit_message(chat, outcome.user_message, "m1 edited")
        .await
        .unwrap();
    state.send_message(chat, "m3", None, Vec::new()).await.unwrap();

    let fork_after = state.active_messages(fork).unwrap();
    assert_eq!(fork_after, fork_before);
}

#[tokio::test]
async fn test_abort_clears_registry_and_keeps_partial_content() {
    let chunks: Vec<String> = (0..50).map(|i| format!("c{i} ")).collect();
    let provider =
        Arc::new(ScriptedProvider::new(chunks).with_chunk_delay(Duration::from_millis(20)));
    let (state, _) = state_with(provider).await;
    let chat = state.create_chat().await;

    let task_state = state.clone();
    let handle =
        tokio::spawn(async move { task_state.send_message(chat, "go", None, Vec::new()).await });

    // Wait for streaming to start and some content to land
    let poll_state = state.clone();
    wait_until(move || {
        poll_state
            .chat(chat)
            .map(|c| {
                let leaf = c.current_leaf;
                !c.tree.get(leaf).map(|n| n.content.is_empty()).unwrap_or(true)
            })
            .unwrap_or(false)
    })
    .await;
    assert!(state.streaming(chat));

    assert!(state.abort_chat(chat));
    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.aborted);

    // Once the send future settles the registry entry is gone
    assert!(!state.streaming(chat));
    assert!(state.active_generations().is_empty());

    // Partial content stayed in place, no rollback
    let chat_snapshot = state.chat(chat).unwrap();
    let content = &chat_snapshot.tree.get(outcome.assistant_message).unwrap().content;
    assert!(!content.is_empty());
    assert!(!content.contains("c49"));

    // Aborting again after completion is a quiet no-op
    assert!(!state.abort_chat(chat));
}

#[tokio::test]
async fn test_quota_requested_once_across_chats() {
    let provider = Arc::new(ScriptedProvider::new(["done"]));
    let (state, storage) = state_with(provider).await;

    let mut handles = Vec::new();
    for _ in 0..3 {
        let chat = state.create_chat().await;
        let task_state = state.clone();
        handles.push(tokio::spawn(async move {
            task_state.send_message(chat, "first", None, Vec::new()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Three first completions, one elevated-quota request
    assert_eq!(storage.quota_requests(), 1);
}

#[tokio::test]
async fn test_double_send_rejected_while_streaming() {
    let chunks: Vec<String> = (0..20).map(|i| format!("{i}")).collect();
    let provider =
        Arc::new(ScriptedProvider::new(chunks).with_chunk_delay(Duration::from_millis(20)));
    let (state, _) = state_with(provider).await;
    let chat = state.create_chat().await;

    let task_state = state.clone();
    let handle =
        tokio::spawn(async move { task_state.send_message(chat, "one", None, Vec::new()).await });

    let poll_state = state.clone();
    wait_until(move || poll_state.streaming(chat)).await;

    let second = state.send_message(chat, "two", None, Vec::new()).await;
    assert!(matches!(second, Err(StateError::AlreadyStreaming(id)) if id == chat));

    state.abort_chat(chat);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_concurrent_chats_stream_independently() {
    let provider =
        Arc::new(ScriptedProvider::new(["x", "y", "z"]).with_chunk_delay(Duration::from_millis(5)));
    let (state, _) = state_with(provider).await;
    let a = state.create_chat().await;
    let b = state.create_chat().await;

    let (ra, rb) = futures::join!(
        state.send_message(a, "for a", None, Vec::new()),
        state.send_message(b, "for b", None, Vec::new()),
    );
    ra.unwrap();
    rb.unwrap();

    for chat in [a, b] {
        let messages = state.active_messages(chat).unwrap();
        assert_eq!(messages[1].content, "xyz");
        assert!(!state.streaming(chat));
    }
}

#[tokio::test]
async fn test_provider_failure_keeps_partial_and_clears_registry() {
    let provider = Arc::new(FailingProvider::with_partial(["par", "tial"], "boom"));
    let (state, _) = state_with(provider).await;
    let chat = state.create_chat().await;

    let result = state.send_message(chat, "hi", None, Vec::new()).await;
    assert!(matches!(result, Err(StateError::Provider(_))));

    // Failure in one chat never leaks into the registry or other chats
    assert!(!state.streaming(chat));
    let messages = state.active_messages(chat).unwrap();
    assert_eq!(messages[1].content, "partial");
}

#[tokio::test]
async fn test_missing_endpoint_fails_fast() {
    let provider = Arc::new(ScriptedProvider::new(["ok"]));
    let storage = Arc::new(MemoryStorage::new());
    let providers = ProviderRegistry::new().with(EndpointType::OpenAiCompatible, provider);
    let state = ChatState::new(storage, providers).await;
    // Defaults: no endpoint URL, no model
    let chat = state.create_chat().await;

    let result = state.send_message(chat, "hi", None, Vec::new()).await;
    assert!(matches!(result, Err(StateError::Configuration(_))));

    // Nothing was appended and nothing registered
    assert!(state.active_messages(chat).unwrap().is_empty());
    assert!(!state.streaming(chat));
}

#[tokio::test]
async fn test_attachments_persist_or_rescue_with_backend_switch() {
    let provider = Arc::new(ScriptedProvider::new(["noted"]));

    // Start on a backend without binary persistence
    let volatile = Arc::new(MemoryStorage::volatile());
    let providers = ProviderRegistry::new().with(EndpointType::OpenAiCompatible, provider);
    let state = ChatState::new(volatile, providers).await;
    state
        .settings()
        .update(|s| {
            s.endpoint_url = "http://localhost:8080".to_string();
            s.default_model = Some("base-model".to_string());
        })
        .await;

    let chat = state.create_chat().await;
    let outcome = state
        .send_message(
            chat,
            "see attached",
            None,
            vec![NewAttachment::new("a.png", "image/png", vec![7; 32])],
        )
        .await
        .unwrap();

    let node_attachments = |state: &ChatState| {
        state
            .chat(chat)
            .unwrap()
            .tree
            .get(outcome.user_message)
            .unwrap()
            .attachments
            .clone()
    };
    assert!(!node_attachments(&state)[0].is_persisted());

    // Switching to a binary-capable backend rescues the blob in place
    let durable = Arc::new(MemoryStorage::new());
    let rescued = state.switch_storage(durable.clone()).await.unwrap();
    assert_eq!(rescued, 1);
    assert!(node_attachments(&state)[0].is_persisted());
    assert_eq!(durable.blob_count().await, 1);

    // A second switch pass has nothing left to do
    assert_eq!(state.switch_storage(durable.clone()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_title_derived_after_first_completion() {
    let provider = Arc::new(ScriptedProvider::new(["sure"]));
    let (state, _) = state_with(provider).await;
    let chat = state.create_chat().await;

    assert!(state.chat(chat).unwrap().has_default_title());
    state
        .send_message(chat, "Explain borrow checking", None, Vec::new())
        .await
        .unwrap();
    assert_eq!(state.chat(chat).unwrap().title, "Explain borrow checking");
}

#[tokio::test]
async fn test_switch_version_moves_leaf_between_branches() {
    let provider = Arc::new(ScriptedProvider::new(["first answer"]));
    let (state, _) = state_with(provider).await;
    let chat = state.create_chat().await;

    let first = state
        .send_message(chat, "original", None, Vec::new())
        .await
        .unwrap();

    // Editing forks a sibling branch and moves the leaf there
    let edited = state
        .edit_message(chat, first.user_message, "rewritten")
        .await
        .unwrap();
    let messages = state.active_messages(chat).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "rewritten");
    assert_eq!(state.chat(chat).unwrap().current_leaf, edited);

    // Switching back to the original version restores its full branch
    state.switch_version(chat, first.user_message).await.unwrap();
    let messages = state.active_messages(chat).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "original");
    assert_eq!(messages[1].content, "first answer");
}
