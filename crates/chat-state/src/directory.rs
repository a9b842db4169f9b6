//! The ordered forest of chats and chat groups.
//!
//! Groups and the ungrouped list keep insertion order; moving a chat never
//! disturbs the order of the items it leaves behind. Group membership is
//! mirrored onto the chat's back-reference by the state layer, not here.

use chat_core::{ChatGroup, ChatId, GroupId, SettingsOverrides};
use indexmap::IndexMap;

/// One row of the sidebar snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarEntry {
    Group {
        id: GroupId,
        name: String,
        chats: Vec<ChatId>,
    },
    Chat(ChatId),
}

/// The hierarchy of groups and ungrouped chats.
#[derive(Debug, Default)]
pub struct HierarchyDirectory {
    groups: IndexMap<GroupId, ChatGroup>,
    ungrouped: Vec<ChatId>,
}

impl HierarchyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty group and return its id.
    pub fn create_group(&mut self, name: impl Into<String>) -> GroupId {
        let group = ChatGroup::new(name);
        let id = group.id;
        self.groups.insert(id, group);
        id
    }

    pub fn group(&self, id: GroupId) -> Option<&ChatGroup> {
        self.groups.get(&id)
    }

    pub fn rename_group(&mut self, id: GroupId, name: impl Into<String>) -> bool {
        match self.groups.get_mut(&id) {
            Some(group) => {
                group.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Patch a group's settings overrides in place.
    pub fn update_group_overrides(
        &mut self,
        id: GroupId,
        patch: impl FnOnce(&mut SettingsOverrides),
    ) -> bool {
        match self.groups.get_mut(&id) {
            Some(group) => {
                patch(&mut group.overrides);
                true
            }
            None => false,
        }
    }

    /// Delete a group; its chats cascade to the end of the ungrouped list.
    /// Returns the cascaded chat ids.
    pub fn delete_group(&mut self, id: GroupId) -> Vec<ChatId> {
        let Some(group) = self.groups.shift_remove(&id) else {
            return Vec::new();
        };
        self.ungrouped.extend(group.chat_ids.iter().copied());
        group.chat_ids
    }

    /// Register a chat, optionally directly into a group.
    pub fn register_chat(&mut self, chat: ChatId, group: Option<GroupId>) {
        self.detach(chat);
        match group.and_then(|id| self.groups.get_mut(&id)) {
            Some(group) => group.chat_ids.push(chat),
            None => self.ungrouped.push(chat),
        }
    }

    /// Remove a chat from the forest entirely.
    pub fn remove_chat(&mut self, chat: ChatId) {
        self.detach(chat);
    }

    /// Move a chat into a group, or out to the ungrouped list with `None`.
    /// Moving a chat to where it already lives is a no-op.
    pub fn move_chat_to_group(&mut self, chat: ChatId, group: Option<GroupId>) {
        if self.group_of(chat) == group {
            return;
        }
        self.register_chat(chat, group);
    }

    /// The group currently containing a chat, if any.
    pub fn group_of(&self, chat: ChatId) -> Option<GroupId> {
        self.groups
            .values()
            .find(|group| group.chat_ids.contains(&chat))
            .map(|group| group.id)
    }

    /// Ordered snapshot for the UI layer: groups first (in creation order),
    /// then ungrouped chats.
    pub fn sidebar(&self) -> Vec<SidebarEntry> {
        let mut entries: Vec<SidebarEntry> = self
            .groups
            .values()
            .map(|group| SidebarEntry::Group {
                id: group.id,
                name: group.name.clone(),
                chats: group.chat_ids.clone(),
            })
            .collect();
        entries.extend(self.ungrouped.iter().copied().map(SidebarEntry::Chat));
        entries
    }

    fn detach(&mut self, chat: ChatId) {
        self.ungrouped.retain(|id| *id != chat);
        for group in self.groups.values_mut() {
            group.chat_ids.retain(|id| *id != chat);
        }
    }
}
