use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{RagDeskError, Result};
use crate::interfaces::providers::{DocumentStore, StoredDocument};
use crate::providers::knowledge::{error_for_status, read_json};

#[derive(Deserialize)]
struct FindResponse {
    #[serde(default)]
    documents: Vec<StoredDocument>,
}

/// Document database reached over a REST interface:
/// `{base}/collections/{collection}/documents/{id}`. Listings come back as
/// `{"documents": [{"id": ..., "document": {...}}]}`.
pub struct RemoteDocumentStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl RemoteDocumentStore {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_seconds: Option<u64>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RagDeskError::Config(
                "remote store base_url must not be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.unwrap_or(15)))
            .build()
            .map_err(|e| RagDeskError::Config(e.to_string()))?;
        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/collections/{}/documents",
            self.base_url,
            urlencoding::encode(collection)
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), urlencoding::encode(id))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| RagDeskError::Http(e.to_string()))
    }
}

fn filter_pairs(filter: &Value) -> Vec<(String, String)> {
    filter
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DocumentStore for RemoteDocumentStore {
    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let response = self
            .send(self.client.put(self.document_url(collection, id)).json(&doc))
            .await?;
        error_for_status(response).await?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let response = self
            .send(self.client.get(self.document_url(collection, id)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(response).await.map(Some)
    }

    async fn find_entries(&self, collection: &str, filter: Value) -> Result<Vec<StoredDocument>> {
        let request = self
            .client
            .get(self.collection_url(collection))
            .query(&filter_pairs(&filter));
        let response = self.send(request).await?;
        let parsed: FindResponse = read_json(response).await?;
        Ok(parsed.documents)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let response = self
            .send(self.client.delete(self.document_url(collection, id)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        error_for_status(response).await?;
        Ok(true)
    }
}
