use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::{Config, StorageConfig};
use crate::error::{RagDeskError, Result};
use crate::interfaces::providers::{DocumentStore, KnowledgeProvider, LlmProvider};
use crate::presentation::{load_templates, PresentationGenerator};
use crate::providers::knowledge::HttpKnowledgeProvider;
use crate::providers::memory::InMemoryDocumentStore;
use crate::providers::mirrored::MirroredDocumentStore;
use crate::providers::openai::OpenAiProvider;
use crate::providers::remote::RemoteDocumentStore;
use crate::providers::sqlite::SqliteDocumentStore;
use crate::services::chat::{ChatOptions, ChatService};
use crate::services::library::DocumentLibrary;
use crate::services::notifications::Notifier;
use crate::services::sync::StoreSync;

/// Everything a front-end needs, sharing one chat store and one notifier.
pub struct RagDeskServices {
    pub chat: ChatService,
    pub library: DocumentLibrary,
    pub presentations: PresentationGenerator,
    pub sync: Arc<StoreSync>,
    pub notifier: Notifier,
}

pub struct RagDeskFactory;

impl RagDeskFactory {
    pub async fn create_from_config(config: Config) -> Result<RagDeskServices> {
        let llm = Self::build_llm(&config)?;
        let knowledge: Arc<dyn KnowledgeProvider> = Arc::new(HttpKnowledgeProvider::new(
            &config.knowledge.base_url,
            config.knowledge.api_key.clone(),
            config.knowledge.timeout_seconds,
        )?);
        Self::create_with_providers(config, llm, knowledge).await
    }

    /// Wires services around caller-supplied providers; storage and
    /// presentation settings still come from `config`.
    pub async fn create_with_providers(
        config: Config,
        llm: Arc<dyn LlmProvider>,
        knowledge: Arc<dyn KnowledgeProvider>,
    ) -> Result<RagDeskServices> {
        let notifier = Notifier::default();
        let store = Self::build_store(config.storage.as_ref(), &notifier).await?;
        let sync = Arc::new(StoreSync::new(store, config.user_id()).with_notifier(notifier.clone()));
        let state = Arc::new(RwLock::new(sync.load().await?));

        let options = ChatOptions {
            top_k: config
                .knowledge
                .top_k
                .unwrap_or(ChatOptions::default().top_k),
            history_limit: config
                .chat
                .as_ref()
                .and_then(|c| c.history_limit)
                .unwrap_or(ChatOptions::default().history_limit),
        };
        let chat = ChatService::new(
            llm.clone(),
            knowledge.clone(),
            state.clone(),
            Some(sync.clone()),
            notifier.clone(),
            options,
        );
        let library = DocumentLibrary::new(knowledge, state, Some(sync.clone()), notifier.clone());

        let mut presentations = PresentationGenerator::new(llm, notifier.clone());
        if let Some(presentation) = &config.presentation {
            if let Some(path) = &presentation.templates_path {
                presentations = presentations.with_templates(load_templates(path)?)?;
            }
            if let Some(prompt) = presentation.system_prompt.as_ref().filter(|p| !p.trim().is_empty()) {
                presentations = presentations.with_system_prompt(prompt.clone());
            }
        }

        tracing::info!(user_id = %sync.user_id(), "ragdesk services ready");
        Ok(RagDeskServices {
            chat,
            library,
            presentations,
            sync,
            notifier,
        })
    }

    fn build_llm(config: &Config) -> Result<Arc<dyn LlmProvider>> {
        let openai = config
            .openai
            .as_ref()
            .ok_or_else(|| RagDeskError::Config("Missing openai configuration".to_string()))?;
        // Local OpenAI-compatible servers accept any key.
        let api_key = openai
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| openai.base_url.as_ref().map(|_| "local".to_string()))
            .ok_or_else(|| RagDeskError::Config("Missing OpenAI API key".to_string()))?;
        let provider = OpenAiProvider::new(api_key, openai.model.clone(), openai.base_url.clone())
            .with_temperature(openai.temperature);
        Ok(Arc::new(provider))
    }

    async fn build_store(
        storage: Option<&StorageConfig>,
        notifier: &Notifier,
    ) -> Result<Arc<dyn DocumentStore>> {
        let local: Arc<dyn DocumentStore> = match storage.and_then(|s| s.sqlite_path.as_deref()) {
            Some(path) => Arc::new(SqliteDocumentStore::new(path).await?),
            None => Arc::new(InMemoryDocumentStore::new()),
        };
        let Some(remote) = storage.and_then(|s| s.remote.as_ref()) else {
            return Ok(local);
        };
        let remote: Arc<dyn DocumentStore> = Arc::new(RemoteDocumentStore::new(
            &remote.base_url,
            remote.api_key.clone(),
            remote.timeout_seconds,
        )?);
        Ok(Arc::new(MirroredDocumentStore::new(local, remote, notifier.clone())))
    }
}
