use std::future::Future;
use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::domains::chat::{Chat, ChatId, ChatMode, Message, MessageId, Reaction, Role};
use crate::domains::document::{Chunk, ChunkQuery, ChunkRef, SummaryRequest};
use crate::domains::preferences::{ColorPalette, DisplaySettings, Theme, UserPreferences};
use crate::error::{RagDeskError, Result};
use crate::interfaces::providers::{ChatEvent, ChatTurn, KnowledgeProvider, LlmProvider};
use crate::services::notifications::Notifier;
use crate::services::sync::StoreSync;
use crate::store::ChatStore;

#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    /// Passages requested per retrieval.
    pub top_k: usize,
    /// Earlier messages replayed to the model; 0 replays everything.
    pub history_limit: usize,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            history_limit: 20,
        }
    }
}

/// An exchange in flight: the stored question and the reply being written.
struct Turn {
    chat: Chat,
    query: String,
    reply_id: MessageId,
}

struct Answer {
    deltas: BoxStream<'static, Result<String>>,
    sources: Vec<ChunkRef>,
}

/// Settles a turn whose reply stream was dropped before it ended: an empty
/// reply is removed and the chat is saved as it stands.
struct UnsettledTurn {
    state: Arc<RwLock<ChatStore>>,
    sync: Option<Arc<StoreSync>>,
    chat_id: ChatId,
    reply_id: MessageId,
    settled: bool,
}

impl UnsettledTurn {
    fn new(service: &ChatService, turn: &Turn) -> Self {
        Self {
            state: service.state.clone(),
            sync: service.sync.clone(),
            chat_id: turn.chat.id.clone(),
            reply_id: turn.reply_id.clone(),
            settled: false,
        }
    }
}

impl Drop for UnsettledTurn {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        tracing::debug!(chat_id = %self.chat_id, "reply stream dropped before completion");
        let state = self.state.clone();
        let sync = self.sync.clone();
        let chat_id = std::mem::take(&mut self.chat_id);
        let reply_id = std::mem::take(&mut self.reply_id);
        handle.spawn(async move {
            let chat = {
                let mut guard = state.write().await;
                remove_empty_reply(&mut guard, &chat_id, &reply_id);
                guard.chat(&chat_id).cloned()
            };
            if let (Some(sync), Some(chat)) = (sync, chat) {
                if let Err(err) = sync.persist_chat(&chat).await {
                    tracing::warn!(chat_id = %chat.id, error = %err, "could not save interrupted chat");
                }
            }
        });
    }
}

fn remove_empty_reply(store: &mut ChatStore, chat_id: &str, reply_id: &str) {
    let empty = store
        .chat(chat_id)
        .and_then(|c| c.message(reply_id))
        .map(|m| m.content.is_empty())
        .unwrap_or(false);
    if empty {
        let _ = store.delete_message(chat_id, reply_id);
    }
}

pub struct ChatService {
    llm: Arc<dyn LlmProvider>,
    knowledge: Arc<dyn KnowledgeProvider>,
    state: Arc<RwLock<ChatStore>>,
    sync: Option<Arc<StoreSync>>,
    notifier: Notifier,
    options: ChatOptions,
}

impl ChatService {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        knowledge: Arc<dyn KnowledgeProvider>,
        state: Arc<RwLock<ChatStore>>,
        sync: Option<Arc<StoreSync>>,
        notifier: Notifier,
        options: ChatOptions,
    ) -> Self {
        Self {
            llm,
            knowledge,
            state,
            sync,
            notifier,
            options,
        }
    }

    pub fn state(&self) -> Arc<RwLock<ChatStore>> {
        self.state.clone()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn chat(&self, chat_id: &str) -> Result<Chat> {
        self.state.read().await.require_chat(chat_id).cloned()
    }

    pub async fn active_chat(&self) -> Option<Chat> {
        self.state.read().await.active_chat().cloned()
    }

    pub async fn list_chats(&self) -> Vec<Chat> {
        self.state.read().await.chats().into_iter().cloned().collect()
    }

    pub async fn preferences(&self) -> UserPreferences {
        self.state.read().await.preferences().clone()
    }

    /// Sends `content` to the chat and streams the reply text as it arrives.
    pub fn send_message_stream<'a>(
        &'a self,
        chat_id: &'a str,
        content: &'a str,
    ) -> BoxStream<'a, Result<String>> {
        self.drive(self.begin_turn(chat_id, content))
    }

    /// Sends `content` and waits for the full reply.
    pub async fn send_message(&self, chat_id: &str, content: &str) -> Result<Message> {
        let turn = self.begin_turn(chat_id, content).await?;
        self.complete(turn).await
    }

    /// Drops the replies to the last question and asks it again.
    pub fn regenerate_last_stream<'a>(&'a self, chat_id: &'a str) -> BoxStream<'a, Result<String>> {
        self.drive(self.begin_regeneration(chat_id))
    }

    pub async fn regenerate_last(&self, chat_id: &str) -> Result<Message> {
        let turn = self.begin_regeneration(chat_id).await?;
        self.complete(turn).await
    }

    async fn complete(&self, turn: Turn) -> Result<Message> {
        let chat_id = turn.chat.id.clone();
        let reply_id = turn.reply_id.clone();
        let mut deltas = self.drive(async move { Ok(turn) });
        while let Some(delta) = deltas.next().await {
            delta?;
        }
        drop(deltas);
        let guard = self.state.read().await;
        guard
            .require_chat(&chat_id)?
            .message(&reply_id)
            .cloned()
            .ok_or_else(|| RagDeskError::NotFound(format!("message {reply_id}")))
    }

    fn drive<'a, F>(&'a self, start: F) -> BoxStream<'a, Result<String>>
    where
        F: Future<Output = Result<Turn>> + Send + 'a,
    {
        Box::pin(try_stream! {
            let turn = start.await?;
            let mut unsettled = UnsettledTurn::new(self, &turn);
            let opened = self.open_answer(&turn).await;
            if let Err(err) = &opened {
                unsettled.settled = true;
                self.abort_turn(&turn, err).await;
            }
            let Answer { mut deltas, sources } = opened?;

            while let Some(item) = deltas.next().await {
                if let Err(err) = &item {
                    unsettled.settled = true;
                    self.abort_turn(&turn, err).await;
                }
                let delta = item?;
                self.state
                    .write()
                    .await
                    .append_to_message(&turn.chat.id, &turn.reply_id, &delta)?;
                yield delta;
            }

            unsettled.settled = true;
            self.finish_turn(&turn, sources).await?;
        })
    }

    async fn begin_turn(&self, chat_id: &str, content: &str) -> Result<Turn> {
        let query = content.trim();
        if query.is_empty() {
            return Err(RagDeskError::Validation("message must not be empty".to_string()));
        }
        let mut guard = self.state.write().await;
        let user_id = guard.add_message(chat_id, Role::User, query, None)?;
        let reply_id = guard.add_message(chat_id, Role::Assistant, "", Some(&user_id))?;
        let chat = guard.require_chat(chat_id)?.clone();
        tracing::debug!(chat_id, mode = %chat.mode, "turn started");
        Ok(Turn {
            chat,
            query: query.to_string(),
            reply_id,
        })
    }

    async fn begin_regeneration(&self, chat_id: &str) -> Result<Turn> {
        let mut guard = self.state.write().await;
        let question = guard
            .require_chat(chat_id)?
            .last_user_message()
            .cloned()
            .ok_or_else(|| RagDeskError::Validation("chat has no question to regenerate".to_string()))?;
        let stale: Vec<MessageId> = guard
            .replies(chat_id, &question.id)?
            .into_iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.id.clone())
            .collect();
        for id in stale {
            guard.delete_message(chat_id, &id)?;
        }
        let reply_id = guard.add_message(chat_id, Role::Assistant, "", Some(&question.id))?;
        let chat = guard.require_chat(chat_id)?.clone();
        Ok(Turn {
            chat,
            query: question.content,
            reply_id,
        })
    }

    async fn open_answer(&self, turn: &Turn) -> Result<Answer> {
        match turn.chat.mode {
            ChatMode::Chat => {
                let turns = self.history_turns(&turn.chat, &turn.reply_id, None);
                Ok(Answer {
                    deltas: text_deltas(self.llm.chat_stream(turns)),
                    sources: Vec::new(),
                })
            }
            ChatMode::Rag => {
                let chunks = self.retrieve(turn).await?;
                let prompt = build_context_prompt(&turn.query, &chunks);
                let turns = self.history_turns(&turn.chat, &turn.reply_id, Some(prompt));
                Ok(Answer {
                    deltas: text_deltas(self.llm.chat_stream(turns)),
                    sources: chunks.iter().map(Chunk::to_ref).collect(),
                })
            }
            ChatMode::Search => {
                let chunks = self.retrieve(turn).await?;
                let sources = chunks.iter().map(Chunk::to_ref).collect();
                let text = render_search_results(&chunks);
                Ok(Answer {
                    deltas: stream::once(async move { Ok(text) }).boxed(),
                    sources,
                })
            }
            ChatMode::Summarize => {
                let request = summary_request(&turn.chat, &turn.query);
                let summary = self.knowledge.summarize(&request).await?;
                Ok(Answer {
                    deltas: stream::once(async move { Ok(summary) }).boxed(),
                    sources: Vec::new(),
                })
            }
        }
    }

    async fn retrieve(&self, turn: &Turn) -> Result<Vec<Chunk>> {
        let query = ChunkQuery {
            query: turn.query.clone(),
            document_ids: turn.chat.document_ids.clone(),
            top_k: self.options.top_k.max(1),
        };
        let mut chunks = self.knowledge.retrieve_chunks(&query).await?;
        chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
        chunks.truncate(query.top_k);
        Ok(chunks)
    }

    /// System prompt plus replayed history, ending with the current question.
    /// `question_override` replaces the text of that final question.
    fn history_turns(&self, chat: &Chat, reply_id: &str, question_override: Option<String>) -> Vec<ChatTurn> {
        let mut turns = Vec::new();
        if let Some(prompt) = chat.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            turns.push(ChatTurn::new(Role::System, prompt));
        }

        let mut history: Vec<&Message> = chat
            .messages
            .iter()
            .filter(|m| m.id != reply_id && m.role != Role::System && !m.content.is_empty())
            .collect();
        let limit = self.options.history_limit;
        if limit > 0 && history.len() > limit {
            history = history.split_off(history.len() - limit);
        }

        let last = history.len().saturating_sub(1);
        for (idx, message) in history.iter().enumerate() {
            let content = match (&question_override, idx == last && message.role == Role::User) {
                (Some(text), true) => text.clone(),
                _ => message.content.clone(),
            };
            turns.push(ChatTurn::new(message.role, content));
        }
        turns
    }

    async fn finish_turn(&self, turn: &Turn, sources: Vec<ChunkRef>) -> Result<()> {
        let chat = {
            let mut guard = self.state.write().await;
            if !sources.is_empty() {
                guard.set_message_sources(&turn.chat.id, &turn.reply_id, sources)?;
            }
            guard.require_chat(&turn.chat.id)?.clone()
        };
        self.persist_chat(&chat).await;
        Ok(())
    }

    async fn abort_turn(&self, turn: &Turn, err: &RagDeskError) {
        let chat = {
            let mut guard = self.state.write().await;
            remove_empty_reply(&mut guard, &turn.chat.id, &turn.reply_id);
            guard.chat(&turn.chat.id).cloned()
        };
        self.notifier
            .error(format!("{} request failed: {err}", turn.chat.mode));
        if let Some(chat) = chat {
            self.persist_chat(&chat).await;
        }
    }

    async fn persist_chat(&self, chat: &Chat) {
        let Some(sync) = &self.sync else {
            return;
        };
        if let Err(err) = sync.persist_chat(chat).await {
            self.notifier
                .warn(format!("Could not save chat '{}': {err}", chat.title));
        }
    }

    async fn persist_preferences(&self) {
        let Some(sync) = &self.sync else {
            return;
        };
        let prefs = self.state.read().await.preferences().clone();
        if let Err(err) = sync.persist_preferences(&prefs).await {
            self.notifier.warn(format!("Could not save preferences: {err}"));
        }
    }

    async fn mutate_chat<T>(
        &self,
        chat_id: &str,
        f: impl FnOnce(&mut ChatStore) -> Result<T>,
    ) -> Result<T> {
        let (value, chat) = {
            let mut guard = self.state.write().await;
            let value = f(&mut *guard)?;
            (value, guard.chat(chat_id).cloned())
        };
        if let Some(chat) = chat {
            self.persist_chat(&chat).await;
        }
        Ok(value)
    }

    async fn mutate_preferences<T>(&self, f: impl FnOnce(&mut ChatStore) -> Result<T>) -> Result<T> {
        let value = {
            let mut guard = self.state.write().await;
            f(&mut *guard)?
        };
        self.persist_preferences().await;
        Ok(value)
    }

    pub async fn create_chat(&self, mode: ChatMode, title: Option<&str>) -> Result<ChatId> {
        let id = self.state.write().await.create_chat(mode, title);
        let chat = self.chat(&id).await?;
        self.persist_chat(&chat).await;
        self.persist_preferences().await;
        Ok(id)
    }

    pub async fn select_chat(&self, chat_id: &str) -> Result<()> {
        self.mutate_preferences(|s| s.select_chat(chat_id)).await
    }

    pub async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        let removed = self.state.write().await.delete_chat(chat_id)?;
        if let Some(sync) = &self.sync {
            if let Err(err) = sync.remove_chat(chat_id).await {
                self.notifier
                    .warn(format!("Could not delete chat '{}' from storage: {err}", removed.title));
            }
        }
        self.persist_preferences().await;
        Ok(())
    }

    pub async fn rename_chat(&self, chat_id: &str, title: &str) -> Result<()> {
        self.mutate_chat(chat_id, |s| s.rename_chat(chat_id, title)).await
    }

    pub async fn set_chat_mode(&self, chat_id: &str, mode: ChatMode) -> Result<()> {
        self.mutate_chat(chat_id, |s| s.set_chat_mode(chat_id, mode)).await
    }

    pub async fn set_chat_documents(&self, chat_id: &str, document_ids: Vec<String>) -> Result<()> {
        self.mutate_chat(chat_id, |s| s.set_chat_documents(chat_id, document_ids))
            .await
    }

    pub async fn set_system_prompt(&self, chat_id: &str, prompt: Option<String>) -> Result<()> {
        self.mutate_chat(chat_id, |s| s.set_system_prompt(chat_id, prompt))
            .await
    }

    pub async fn clear_messages(&self, chat_id: &str) -> Result<()> {
        self.mutate_chat(chat_id, |s| s.clear_messages(chat_id)).await
    }

    pub async fn edit_message(&self, chat_id: &str, message_id: &str, content: &str) -> Result<()> {
        self.mutate_chat(chat_id, |s| s.edit_message(chat_id, message_id, content))
            .await
    }

    pub async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()> {
        self.mutate_chat(chat_id, |s| s.delete_message(chat_id, message_id).map(|_| ()))
            .await
    }

    pub async fn toggle_reaction(
        &self,
        chat_id: &str,
        message_id: &str,
        reaction: Reaction,
    ) -> Result<bool> {
        self.mutate_chat(chat_id, |s| s.toggle_reaction(chat_id, message_id, reaction))
            .await
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        self.mutate_preferences(|s| {
            s.set_theme(theme);
            Ok(())
        })
        .await
    }

    pub async fn set_display(&self, display: DisplaySettings) -> Result<()> {
        self.mutate_preferences(|s| {
            s.set_display(display);
            Ok(())
        })
        .await
    }

    pub async fn set_default_system_prompt(&self, mode: ChatMode, prompt: &str) -> Result<()> {
        self.mutate_preferences(|s| {
            s.set_default_system_prompt(mode, prompt);
            Ok(())
        })
        .await
    }

    pub async fn set_custom_palette(&self, palette: ColorPalette) -> Result<()> {
        self.mutate_preferences(|s| s.set_custom_palette(palette)).await
    }

    pub async fn reset_palette(&self) -> Result<()> {
        self.mutate_preferences(|s| {
            s.reset_palette();
            Ok(())
        })
        .await
    }
}

fn text_deltas(events: BoxStream<'static, Result<ChatEvent>>) -> BoxStream<'static, Result<String>> {
    events
        .filter_map(|event| async move {
            match event {
                Ok(ChatEvent::Delta(text)) => Some(Ok(text)),
                Ok(ChatEvent::Done { .. }) => None,
                Err(err) => Some(Err(err)),
            }
        })
        .boxed()
}

fn summary_request(chat: &Chat, query: &str) -> SummaryRequest {
    if chat.document_ids.is_empty() {
        SummaryRequest {
            document_ids: Vec::new(),
            text: Some(query.to_string()),
            instructions: chat.system_prompt.clone(),
        }
    } else {
        SummaryRequest {
            document_ids: chat.document_ids.clone(),
            text: None,
            instructions: Some(query.to_string()),
        }
    }
}

pub fn build_context_prompt(question: &str, chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return format!(
            "No relevant passages were found in the selected documents.\n\nQuestion: {question}"
        );
    }
    let mut out = String::from("Context passages:\n");
    for (idx, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!("\n[{}] {}\n", idx + 1, chunk.source_label()));
        if let Some(before) = chunk.context_before.as_deref().filter(|s| !s.trim().is_empty()) {
            out.push_str(&format!("...{} ", before.trim()));
        }
        out.push_str(chunk.text.trim());
        if let Some(after) = chunk.context_after.as_deref().filter(|s| !s.trim().is_empty()) {
            out.push_str(&format!(" {}...", after.trim()));
        }
        out.push('\n');
    }
    out.push_str(&format!("\nQuestion: {question}"));
    out
}

pub fn render_search_results(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return "No matching passages found.".to_string();
    }
    let mut out = format!(
        "Found {} passage{}:\n",
        chunks.len(),
        if chunks.len() == 1 { "" } else { "s" }
    );
    for (idx, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. **{}** (score {:.2})\n",
            idx + 1,
            chunk.source_label(),
            chunk.score
        ));
        for line in chunk.text.trim().lines() {
            out.push_str(&format!("   > {line}\n"));
        }
    }
    out
}
