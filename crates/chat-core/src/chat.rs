//! The chat entity and its optional group container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{MessageId, MessageTree};
use crate::settings::SettingsOverrides;

/// Identifier of a chat.
pub type ChatId = Uuid;

/// Identifier of a chat group.
pub type GroupId = Uuid;

/// An optional container for chats, carrying its own settings tier.
///
/// Membership is recorded both here (ordered `chat_ids`) and as a
/// back-reference on the chat; the directory keeps the two in step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat_ids: Vec<ChatId>,
    #[serde(default, skip_serializing_if = "SettingsOverrides::is_empty")]
    pub overrides: SettingsOverrides,
}

impl ChatGroup {
    /// Create an empty group with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            chat_ids: Vec::new(),
            overrides: SettingsOverrides::default(),
        }
    }
}

/// A single conversation: the message tree, the active-leaf pointer and the
/// chat-tier settings overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub title: String,
    /// Back-reference to the containing group, if any. Not ownership.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub tree: MessageTree,
    /// Deepest node of the currently displayed branch.
    pub current_leaf: MessageId,
    #[serde(default, skip_serializing_if = "SettingsOverrides::is_empty")]
    pub overrides: SettingsOverrides,
    /// Set when this chat was forked from another chat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_chat: Option<ChatId>,
    #[serde(default)]
    pub debug_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

impl Chat {
    /// Title a chat carries until its first completed exchange names it.
    pub const DEFAULT_TITLE: &'static str = "New Chat";

    /// Create an empty chat with a fresh tree.
    pub fn new() -> Self {
        let tree = MessageTree::new();
        let root = tree.root();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: Self::DEFAULT_TITLE.to_string(),
            group_id: None,
            tree,
            current_leaf: root,
            overrides: SettingsOverrides::default(),
            origin_chat: None,
            debug_enabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a forked chat around a copied tree prefix.
    pub fn forked_from(source: &Chat, tree: MessageTree, leaf: MessageId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: source.title.clone(),
            group_id: None,
            tree,
            current_leaf: leaf,
            overrides: source.overrides.clone(),
            origin_chat: Some(source.id),
            debug_enabled: source.debug_enabled,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the chat as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// True while the chat still carries the placeholder title.
    pub fn has_default_title(&self) -> bool {
        self.title == Self::DEFAULT_TITLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageRole;

    #[test]
    fn test_new_chat_leaf_is_root() {
        let chat = Chat::new();
        assert_eq!(chat.current_leaf, chat.tree.root());
        assert!(chat.has_default_title());
        assert!(chat.group_id.is_none());
        assert!(chat.origin_chat.is_none());
    }

    #[test]
    fn test_forked_chat_references_origin() {
        let mut source = Chat::new();
        let m1 = source
            .tree
            .add_child(source.tree.root(), MessageRole::User, "m1", vec![])
            .unwrap();
        source.current_leaf = m1;
        source.title = "Original".to_string();

        let (tree, leaf) = source.tree.copy_path_prefix(m1).unwrap();
        let fork = Chat::forked_from(&source, tree, leaf);

        assert_eq!(fork.origin_chat, Some(source.id));
        assert_ne!(fork.id, source.id);
        assert_eq!(fork.title, "Original");
        assert_eq!(fork.tree.get(fork.current_leaf).unwrap().content, "m1");
    }
}
