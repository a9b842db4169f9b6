//! The branching conversation structure.
//!
//! A [`MessageTree`] is an arena of nodes keyed by id. Each node holds an
//! ordered list of child ids; the parent link lets the active path be
//! recovered from a single stored leaf id. Editing a message never mutates
//! history - it adds a sibling branch and the chat's leaf pointer moves.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::Attachment;

/// Identifier of a message node.
pub type MessageId = Uuid;

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single node in the conversation tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageNode {
    pub id: MessageId,
    pub role: MessageRole,
    /// Appended to incrementally while a generation streams.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// None only for the root node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<MessageId>,
    /// Ordered child ids; siblings are alternative branches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<MessageId>,
}

impl MessageNode {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            parent: None,
            replies: Vec::new(),
        }
    }
}

/// A flattened message as sent to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Arena-backed conversation tree with a single root.
///
/// The root is a system sentinel that anchors branching for the very first
/// user message; it never reaches a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTree {
    root: MessageId,
    nodes: IndexMap<MessageId, MessageNode>,
}

impl Default for MessageTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageTree {
    /// Create a tree holding only the root sentinel.
    pub fn new() -> Self {
        let root = MessageNode::new(MessageRole::System, "");
        let root_id = root.id;
        let mut nodes = IndexMap::new();
        nodes.insert(root_id, root);
        Self {
            root: root_id,
            nodes,
        }
    }

    /// The root sentinel's id.
    pub fn root(&self) -> MessageId {
        self.root
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root sentinel exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: MessageId) -> Option<&MessageNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut MessageNode> {
        self.nodes.get_mut(&id)
    }

    /// Iterate over all nodes mutably, in insertion order.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut MessageNode> {
        self.nodes.values_mut()
    }

    /// Iterate over all nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &MessageNode> {
        self.nodes.values()
    }

    /// Append a new child under `parent` and return its id.
    ///
    /// Returns `None` when the parent does not exist.
    pub fn add_child(
        &mut self,
        parent: MessageId,
        role: MessageRole,
        content: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Option<MessageId> {
        if !self.nodes.contains_key(&parent) {
            return None;
        }
        let mut node = MessageNode::new(role, content);
        node.parent = Some(parent);
        node.attachments = attachments;
        let id = node.id;
        self.nodes.insert(id, node);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.replies.push(id);
        }
        Some(id)
    }

    /// Append streamed content to a node. Missing ids are ignored - the
    /// generation that owned the node may have been deleted with its chat.
    pub fn append_content(&mut self, id: MessageId, chunk: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.content.push_str(chunk);
        }
    }

    /// The id chain from the root to `leaf`, root first.
    ///
    /// Returns `None` when `leaf` is unknown.
    pub fn path_to(&self, leaf: MessageId) -> Option<Vec<MessageId>> {
        let mut path = Vec::new();
        let mut cursor = Some(leaf);
        while let Some(id) = cursor {
            let node = self.nodes.get(&id)?;
            path.push(id);
            cursor = node.parent;
        }
        path.reverse();
        Some(path)
    }

    /// The active path flattened to provider messages, root sentinel and
    /// empty nodes excluded.
    pub fn flatten_path(&self, leaf: MessageId) -> Vec<ChatMessage> {
        let Some(path) = self.path_to(leaf) else {
            return Vec::new();
        };
        path.into_iter()
            .filter(|id| *id != self.root)
            .filter_map(|id| self.nodes.get(&id))
            .map(|node| ChatMessage {
                role: node.role,
                content: node.content.clone(),
            })
            .collect()
    }

    /// Follow the most recent reply chain down from `id` to a leaf.
    ///
    /// Used when switching between sibling versions: the newest continuation
    /// of the chosen branch becomes the active leaf.
    pub fn deepest_descendant(&self, id: MessageId) -> Option<MessageId> {
        let mut cursor = self.nodes.get(&id)?;
        loop {
            match cursor.replies.last().and_then(|c| self.nodes.get(c)) {
                Some(child) => cursor = child,
                None => return Some(cursor.id),
            }
        }
    }

    /// Sibling branches of a node (its parent's ordered reply list).
    pub fn siblings_of(&self, id: MessageId) -> Vec<MessageId> {
        self.nodes
            .get(&id)
            .and_then(|node| node.parent)
            .and_then(|parent| self.nodes.get(&parent))
            .map(|parent| parent.replies.clone())
            .unwrap_or_default()
    }

    /// Deep-copy the root-to-`until` path into a fresh tree with new ids.
    ///
    /// Returns the copy and its leaf id. The copy shares no structure with
    /// this tree, so later edits to either side are invisible to the other.
    pub fn copy_path_prefix(&self, until: MessageId) -> Option<(MessageTree, MessageId)> {
        let path = self.path_to(until)?;
        let mut copy = MessageTree::new();
        let mut leaf = copy.root();
        for id in path.into_iter().filter(|id| *id != self.root) {
            let source = self.nodes.get(&id)?;
            let child = copy.add_child(
                leaf,
                source.role,
                source.content.clone(),
                source.attachments.clone(),
            )?;
            if let Some(node) = copy.get_mut(child) {
                node.timestamp = source.timestamp;
            }
            leaf = child;
        }
        Some((copy, leaf))
    }
}
