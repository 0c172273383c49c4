use std::sync::Arc;

use serde_json::{json, Value};

use crate::domains::chat::Chat;
use crate::domains::preferences::UserPreferences;
use crate::error::{RagDeskError, Result};
use crate::interfaces::providers::DocumentStore;
use crate::services::notifications::Notifier;
use crate::store::ChatStore;

pub const CHATS_COLLECTION: &str = "chats";
pub const PREFERENCES_COLLECTION: &str = "preferences";

/// Mirrors one user's [`ChatStore`] into a document store.
pub struct StoreSync {
    store: Arc<dyn DocumentStore>,
    user_id: String,
    notifier: Option<Notifier>,
}

impl StoreSync {
    pub fn new(store: Arc<dyn DocumentStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            notifier: None,
        }
    }

    /// Reports repairs made while loading, such as a dropped palette.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn chat_doc_id(&self, chat_id: &str) -> String {
        format!("{}:{}", self.user_id, chat_id)
    }

    pub async fn load(&self) -> Result<ChatStore> {
        let mut preferences = match self
            .store
            .get(PREFERENCES_COLLECTION, &self.user_id)
            .await?
        {
            Some(doc) => decode_preferences(doc)?,
            None => UserPreferences::default(),
        };
        if let Some(err) = preferences.discard_invalid_palette() {
            tracing::warn!(user_id = %self.user_id, error = %err, "stored palette is invalid, using the default");
            if let Some(notifier) = &self.notifier {
                notifier.warn(format!("Saved colour palette was invalid and has been reset: {err}"));
            }
            if let Err(err) = self.persist_preferences(&preferences).await {
                tracing::warn!(user_id = %self.user_id, error = %err, "could not save repaired preferences");
            }
        }

        let docs = self
            .store
            .find(CHATS_COLLECTION, json!({ "user_id": self.user_id }))
            .await?;
        let mut chats = Vec::with_capacity(docs.len());
        for doc in docs {
            match decode_chat(doc) {
                Ok(chat) => chats.push(chat),
                Err(err) => tracing::warn!(user_id = %self.user_id, error = %err, "skipping unreadable chat document"),
            }
        }
        tracing::debug!(user_id = %self.user_id, chats = chats.len(), "loaded chat store");
        Ok(ChatStore::from_parts(chats, preferences))
    }

    pub async fn persist_chat(&self, chat: &Chat) -> Result<()> {
        let doc = json!({
            "user_id": self.user_id,
            "chat": serde_json::to_value(chat)?,
        });
        self.store
            .put(CHATS_COLLECTION, &self.chat_doc_id(&chat.id), doc)
            .await
    }

    pub async fn remove_chat(&self, chat_id: &str) -> Result<bool> {
        self.store
            .delete(CHATS_COLLECTION, &self.chat_doc_id(chat_id))
            .await
    }

    pub async fn persist_preferences(&self, preferences: &UserPreferences) -> Result<()> {
        let doc = json!({
            "user_id": self.user_id,
            "preferences": serde_json::to_value(preferences)?,
        });
        self.store
            .put(PREFERENCES_COLLECTION, &self.user_id, doc)
            .await
    }

    /// Writes every chat and the preferences.
    pub async fn persist_all(&self, store: &ChatStore) -> Result<()> {
        for chat in store.chats() {
            self.persist_chat(chat).await?;
        }
        self.persist_preferences(store.preferences()).await
    }
}

fn decode_chat(mut doc: Value) -> Result<Chat> {
    let chat = doc
        .get_mut("chat")
        .map(Value::take)
        .ok_or_else(|| RagDeskError::Serialization("chat document without 'chat' field".to_string()))?;
    Ok(serde_json::from_value(chat)?)
}

fn decode_preferences(mut doc: Value) -> Result<UserPreferences> {
    let prefs = doc
        .get_mut("preferences")
        .map(Value::take)
        .ok_or_else(|| {
            RagDeskError::Serialization("preferences document without 'preferences' field".to_string())
        })?;
    Ok(serde_json::from_value(prefs)?)
}
