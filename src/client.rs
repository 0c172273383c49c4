use std::path::Path;
use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::domains::chat::{Chat, ChatId, ChatMode, Message};
use crate::domains::document::DocumentInfo;
use crate::domains::presentation::{PresentationBrief, PresentationData};
use crate::error::{RagDeskError, Result};
use crate::factories::app_factory::{RagDeskFactory, RagDeskServices};
use crate::interfaces::providers::{KnowledgeProvider, LlmProvider};
use crate::presentation::{render_html, write_pptx_file, PresentationGenerator};
use crate::services::chat::ChatService;
use crate::services::library::DocumentLibrary;
use crate::services::notifications::UiEvent;

pub struct RagDesk {
    services: RagDeskServices,
}

impl RagDesk {
    pub async fn from_config(config: Config) -> Result<Self> {
        let services = RagDeskFactory::create_from_config(config).await?;
        Ok(Self { services })
    }

    pub async fn from_config_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::from_file(path)?;
        Self::from_config(config).await
    }

    pub async fn with_providers(
        config: Config,
        llm: Arc<dyn LlmProvider>,
        knowledge: Arc<dyn KnowledgeProvider>,
    ) -> Result<Self> {
        let services = RagDeskFactory::create_with_providers(config, llm, knowledge).await?;
        Ok(Self { services })
    }

    pub fn chat(&self) -> &ChatService {
        &self.services.chat
    }

    pub fn library(&self) -> &DocumentLibrary {
        &self.services.library
    }

    pub fn presentations(&self) -> &PresentationGenerator {
        &self.services.presentations
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.services.notifier.subscribe()
    }

    /// The active chat, created in `mode` if there is none.
    pub async fn ensure_active_chat(&self, mode: ChatMode) -> Result<ChatId> {
        match self.services.chat.active_chat().await {
            Some(chat) => Ok(chat.id),
            None => self.services.chat.create_chat(mode, None).await,
        }
    }

    pub fn send_message_stream<'a>(
        &'a self,
        chat_id: &'a str,
        content: &'a str,
    ) -> BoxStream<'a, Result<String>> {
        self.services.chat.send_message_stream(chat_id, content)
    }

    pub async fn send_message(&self, chat_id: &str, content: &str) -> Result<Message> {
        self.services.chat.send_message(chat_id, content).await
    }

    pub async fn list_chats(&self) -> Vec<Chat> {
        self.services.chat.list_chats().await
    }

    pub async fn upload_document<P: AsRef<Path>>(&self, path: P) -> Result<DocumentInfo> {
        self.services.library.upload_path(path).await
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        self.services.library.list().await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<bool> {
        self.services.library.delete(document_id).await
    }

    pub async fn generate_presentation(&self, brief: &PresentationBrief) -> Result<PresentationData> {
        self.services.presentations.generate(brief).await
    }

    /// Writes the deck next to `stem` as `.pptx` and `.html`, coloured with the
    /// user's palette.
    pub async fn export_presentation(&self, data: &PresentationData, stem: &Path) -> Result<()> {
        let palette = self.services.chat.preferences().await.palette();
        write_pptx_file(data, &palette, stem.with_extension("pptx"))?;
        let html = render_html(data, &palette)?;
        let html_path = stem.with_extension("html");
        tokio::fs::write(&html_path, html)
            .await
            .map_err(|e| RagDeskError::Export(format!("writing {}: {e}", html_path.display())))?;
        Ok(())
    }
}
