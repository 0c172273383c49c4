//! Client-side state: chats, their messages, and the user's preferences.
//!
//! The store is plain data with no I/O. Services wrap it in a
//! `tokio::sync::RwLock` and mirror changes to a [`DocumentStore`] through
//! [`crate::services::sync::StoreSync`].
//!
//! [`DocumentStore`]: crate::interfaces::providers::DocumentStore

use std::collections::BTreeSet;

use crate::domains::chat::{Chat, ChatId, ChatMode, Message, MessageId, Reaction, Role, DEFAULT_CHAT_TITLE};
use crate::domains::document::ChunkRef;
use crate::domains::preferences::{ColorPalette, DisplaySettings, Theme, UserPreferences};
use crate::domains::{new_id, now_ms};
use crate::error::{RagDeskError, Result};

const AUTO_TITLE_CHARS: usize = 48;

#[derive(Debug, Clone, Default)]
pub struct ChatStore {
    chats: Vec<Chat>,
    active_chat_id: Option<ChatId>,
    preferences: UserPreferences,
}

impl ChatStore {
    pub fn new(preferences: UserPreferences) -> Self {
        Self {
            chats: Vec::new(),
            active_chat_id: None,
            preferences,
        }
    }

    /// Rebuilds a store from persisted parts. An active id that no longer
    /// names a chat falls back to the most recently updated one, and an
    /// invalid custom palette is dropped.
    pub fn from_parts(chats: Vec<Chat>, mut preferences: UserPreferences) -> Self {
        if let Some(err) = preferences.discard_invalid_palette() {
            tracing::warn!(error = %err, "dropping invalid custom palette");
        }
        let mut store = Self {
            chats,
            active_chat_id: None,
            preferences,
        };
        store.chats.sort_by_key(|c| c.created_at);
        let wanted = store.preferences.active_chat_id.clone();
        store.active_chat_id = match wanted {
            Some(id) if store.chat(&id).is_some() => Some(id),
            _ => store.most_recent_chat_id(),
        };
        store.preferences.active_chat_id = store.active_chat_id.clone();
        store
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    /// Chats, most recently updated first.
    pub fn chats(&self) -> Vec<&Chat> {
        let mut chats: Vec<&Chat> = self.chats.iter().collect();
        chats.reverse();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        chats
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn chat(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn require_chat(&self, id: &str) -> Result<&Chat> {
        self.chat(id)
            .ok_or_else(|| RagDeskError::NotFound(format!("chat {id}")))
    }

    fn chat_mut(&mut self, id: &str) -> Result<&mut Chat> {
        self.chats
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| RagDeskError::NotFound(format!("chat {id}")))
    }

    pub fn active_chat_id(&self) -> Option<&str> {
        self.active_chat_id.as_deref()
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.active_chat_id.as_deref().and_then(|id| self.chat(id))
    }

    pub fn create_chat(&mut self, mode: ChatMode, title: Option<&str>) -> ChatId {
        let now = now_ms();
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CHAT_TITLE)
            .to_string();
        let chat = Chat {
            id: new_id(),
            title,
            messages: Vec::new(),
            mode,
            created_at: now,
            updated_at: now,
            document_ids: Vec::new(),
            system_prompt: self.preferences.system_prompt_for(mode).map(str::to_string),
        };
        let id = chat.id.clone();
        self.chats.push(chat);
        self.set_active(Some(id.clone()));
        id
    }

    pub fn select_chat(&mut self, id: &str) -> Result<()> {
        self.require_chat(id)?;
        self.set_active(Some(id.to_string()));
        Ok(())
    }

    fn set_active(&mut self, id: Option<ChatId>) {
        self.preferences.active_chat_id = id.clone();
        self.active_chat_id = id;
    }

    fn most_recent_chat_id(&self) -> Option<ChatId> {
        self.chats
            .iter()
            .max_by_key(|c| c.updated_at)
            .map(|c| c.id.clone())
    }

    /// Removes a chat. When it was the active one, the most recently updated
    /// remaining chat becomes active, or nothing when none remain.
    pub fn delete_chat(&mut self, id: &str) -> Result<Chat> {
        let index = self
            .chats
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| RagDeskError::NotFound(format!("chat {id}")))?;
        let removed = self.chats.remove(index);
        if self.active_chat_id.as_deref() == Some(id) {
            let next = self.most_recent_chat_id();
            self.set_active(next);
        }
        Ok(removed)
    }

    pub fn rename_chat(&mut self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RagDeskError::Validation("chat title must not be empty".to_string()));
        }
        let chat = self.chat_mut(id)?;
        chat.title = title.to_string();
        chat.updated_at = now_ms();
        Ok(())
    }

    pub fn set_chat_mode(&mut self, id: &str, mode: ChatMode) -> Result<()> {
        let default_prompt = self.preferences.system_prompt_for(mode).map(str::to_string);
        let old_default = {
            let chat = self.require_chat(id)?;
            self.preferences
                .system_prompt_for(chat.mode)
                .map(str::to_string)
        };
        let chat = self.chat_mut(id)?;
        // A prompt the user never customised follows the mode.
        if chat.system_prompt == old_default {
            chat.system_prompt = default_prompt;
        }
        chat.mode = mode;
        chat.updated_at = now_ms();
        Ok(())
    }

    pub fn set_chat_documents(&mut self, id: &str, document_ids: Vec<String>) -> Result<()> {
        let mut seen = BTreeSet::new();
        let document_ids = document_ids
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty() && seen.insert(d.clone()))
            .collect();
        let chat = self.chat_mut(id)?;
        chat.document_ids = document_ids;
        chat.updated_at = now_ms();
        Ok(())
    }

    pub fn set_system_prompt(&mut self, id: &str, prompt: Option<String>) -> Result<()> {
        let chat = self.chat_mut(id)?;
        chat.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        chat.updated_at = now_ms();
        Ok(())
    }

    pub fn clear_messages(&mut self, id: &str) -> Result<()> {
        let chat = self.chat_mut(id)?;
        chat.messages.clear();
        chat.updated_at = now_ms();
        Ok(())
    }

    /// Removes `document_id` from every chat; returns the ids of chats that changed.
    pub fn detach_document(&mut self, document_id: &str) -> Vec<ChatId> {
        let mut changed = Vec::new();
        for chat in &mut self.chats {
            let before = chat.document_ids.len();
            chat.document_ids.retain(|d| d != document_id);
            if chat.document_ids.len() != before {
                chat.updated_at = now_ms();
                changed.push(chat.id.clone());
            }
        }
        changed
    }

    pub fn add_message(
        &mut self,
        chat_id: &str,
        role: Role,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<MessageId> {
        let chat = self.chat_mut(chat_id)?;
        if let Some(parent) = parent_id {
            if chat.message(parent).is_none() {
                return Err(RagDeskError::NotFound(format!("message {parent}")));
            }
        }
        let now = now_ms();
        let message = Message {
            id: new_id(),
            content: content.to_string(),
            role,
            timestamp: now,
            mode: chat.mode,
            reactions: BTreeSet::new(),
            edited: false,
            parent_id: parent_id.map(str::to_string),
            sources: Vec::new(),
        };
        let id = message.id.clone();
        let first_user_message = role == Role::User && chat.last_user_message().is_none();
        chat.messages.push(message);
        chat.updated_at = now;
        if first_user_message && chat.title == DEFAULT_CHAT_TITLE {
            if let Some(title) = derive_title(content) {
                chat.title = title;
            }
        }
        Ok(id)
    }

    fn message_mut(&mut self, chat_id: &str, message_id: &str) -> Result<&mut Message> {
        self.chat_mut(chat_id)?
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| RagDeskError::NotFound(format!("message {message_id}")))
    }

    pub fn append_to_message(&mut self, chat_id: &str, message_id: &str, delta: &str) -> Result<()> {
        self.message_mut(chat_id, message_id)?.content.push_str(delta);
        Ok(())
    }

    pub fn set_message_sources(
        &mut self,
        chat_id: &str,
        message_id: &str,
        sources: Vec<ChunkRef>,
    ) -> Result<()> {
        self.message_mut(chat_id, message_id)?.sources = sources;
        Ok(())
    }

    pub fn edit_message(&mut self, chat_id: &str, message_id: &str, content: &str) -> Result<()> {
        let message = self.message_mut(chat_id, message_id)?;
        if message.content != content {
            message.content = content.to_string();
            message.edited = true;
        }
        self.chat_mut(chat_id)?.updated_at = now_ms();
        Ok(())
    }

    /// Deletes one message. Replies to it stay in the chat without a parent.
    pub fn delete_message(&mut self, chat_id: &str, message_id: &str) -> Result<Message> {
        let chat = self.chat_mut(chat_id)?;
        let index = chat
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| RagDeskError::NotFound(format!("message {message_id}")))?;
        let removed = chat.messages.remove(index);
        for message in &mut chat.messages {
            if message.parent_id.as_deref() == Some(message_id) {
                message.parent_id = None;
            }
        }
        chat.updated_at = now_ms();
        Ok(removed)
    }

    /// Flips one reaction flag and returns whether it is now set.
    pub fn toggle_reaction(&mut self, chat_id: &str, message_id: &str, reaction: Reaction) -> Result<bool> {
        let message = self.message_mut(chat_id, message_id)?;
        if message.reactions.remove(&reaction) {
            Ok(false)
        } else {
            message.reactions.insert(reaction);
            Ok(true)
        }
    }

    pub fn replies(&self, chat_id: &str, message_id: &str) -> Result<Vec<&Message>> {
        let chat = self.require_chat(chat_id)?;
        Ok(chat
            .messages
            .iter()
            .filter(|m| m.parent_id.as_deref() == Some(message_id))
            .collect())
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.preferences.theme = theme;
    }

    pub fn set_display(&mut self, display: DisplaySettings) {
        self.preferences.display = display;
    }

    pub fn set_default_system_prompt(&mut self, mode: ChatMode, prompt: &str) {
        self.preferences
            .default_system_prompts
            .insert(mode, prompt.trim().to_string());
    }

    pub fn set_custom_palette(&mut self, palette: ColorPalette) -> Result<()> {
        palette.validate()?;
        self.preferences.custom_palette = Some(palette);
        Ok(())
    }

    pub fn reset_palette(&mut self) {
        self.preferences.custom_palette = None;
    }
}

fn derive_title(content: &str) -> Option<String> {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut title: String = line.chars().take(AUTO_TITLE_CHARS).collect();
    if line.chars().count() > AUTO_TITLE_CHARS {
        title = title.trim_end().to_string();
        title.push('…');
    }
    Some(title)
}
