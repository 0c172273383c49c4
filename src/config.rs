use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{RagDeskError, Result};

pub const REDACTED: &str = "********";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
}

/// Retrieval / summarization / ingestion service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KnowledgeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub top_k: Option<usize>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteStoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    pub sqlite_path: Option<String>,
    pub remote: Option<RemoteStoreConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatConfig {
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PresentationConfig {
    pub templates_path: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub openai: Option<OpenAiConfig>,
    pub knowledge: KnowledgeConfig,
    pub storage: Option<StorageConfig>,
    pub chat: Option<ChatConfig>,
    pub presentation: Option<PresentationConfig>,
    pub user_id: Option<String>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| RagDeskError::Config(format!("{}: {e}", path.as_ref().display())))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| RagDeskError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Replaces the OpenAI key, e.g. from `RAGDESK_API_KEY`.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.openai.get_or_insert_with(OpenAiConfig::default).api_key = Some(key);
        }
        self
    }

    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or("local")
    }

    /// Copy with every secret masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |secret: &Option<String>| secret.as_ref().map(|_| REDACTED.to_string());
        let mut copy = self.clone();
        if let Some(openai) = &mut copy.openai {
            openai.api_key = mask(&openai.api_key);
        }
        copy.knowledge.api_key = mask(&copy.knowledge.api_key);
        if let Some(remote) = copy.storage.as_mut().and_then(|s| s.remote.as_mut()) {
            remote.api_key = mask(&remote.api_key);
        }
        copy
    }
}
