use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::domains::document::{Chunk, ChunkQuery, DocumentInfo, DocumentUpload, SummaryRequest};
use crate::error::{RagDeskError, Result};
use crate::interfaces::providers::KnowledgeProvider;

#[derive(Deserialize)]
struct ChunksResponse {
    #[serde(default)]
    chunks: Vec<Chunk>,
}

#[derive(Deserialize)]
struct SummaryResponse {
    summary: String,
}

#[derive(Deserialize)]
struct DocumentsResponse {
    #[serde(default)]
    documents: Vec<DocumentInfo>,
}

/// Client for the retrieval service: chunk search, summaries and the document library.
pub struct HttpKnowledgeProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpKnowledgeProvider {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_seconds: Option<u64>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RagDeskError::Config(
                "knowledge base_url must not be empty".to_string(),
            ));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| RagDeskError::Config(e.to_string()))?;
        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| RagDeskError::Http(e.to_string()))
    }
}

pub(crate) async fn error_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RagDeskError::Http(format!(
        "status {}: {}",
        status.as_u16(),
        body.trim()
    )))
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let response = error_for_status(response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RagDeskError::Http(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| RagDeskError::Serialization(e.to_string()))
}

#[async_trait]
impl KnowledgeProvider for HttpKnowledgeProvider {
    async fn retrieve_chunks(&self, query: &ChunkQuery) -> Result<Vec<Chunk>> {
        let response = self
            .send(self.client.post(self.url("chunks")).json(query))
            .await?;
        let parsed: ChunksResponse = read_json(response).await?;
        tracing::debug!(count = parsed.chunks.len(), "retrieved chunks");
        Ok(parsed.chunks)
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String> {
        let response = self
            .send(self.client.post(self.url("summarize")).json(request))
            .await?;
        let parsed: SummaryResponse = read_json(response).await?;
        Ok(parsed.summary)
    }

    async fn ingest_document(&self, upload: DocumentUpload) -> Result<DocumentInfo> {
        let body = json!({
            "file_name": upload.file_name,
            "content_type": upload.content_type,
            "content_base64": general_purpose::STANDARD.encode(&upload.bytes),
        });
        let response = self
            .send(self.client.post(self.url("documents")).json(&body))
            .await?;
        let info: DocumentInfo = read_json(response).await?;
        tracing::info!(document_id = %info.id, name = %info.name, "document ingested");
        Ok(info)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        let response = self.send(self.client.get(self.url("documents"))).await?;
        let parsed: DocumentsResponse = read_json(response).await?;
        Ok(parsed.documents)
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let url = self.url(&format!("documents/{}", urlencoding::encode(document_id)));
        let response = self.send(self.client.delete(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        error_for_status(response).await?;
        Ok(true)
    }
}
