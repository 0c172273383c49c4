use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domains::chat::Role;
use crate::domains::document::{Chunk, ChunkQuery, DocumentInfo, DocumentUpload, SummaryRequest};
use crate::error::Result;

/// One turn of conversation handed to the completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Delta(String),
    Done { finish_reason: Option<String> },
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> Result<String>;

    fn chat_stream(&self, turns: Vec<ChatTurn>) -> BoxStream<'static, Result<ChatEvent>>;
}

#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    async fn retrieve_chunks(&self, query: &ChunkQuery) -> Result<Vec<Chunk>>;
    async fn summarize(&self, request: &SummaryRequest) -> Result<String>;
    async fn ingest_document(&self, upload: DocumentUpload) -> Result<DocumentInfo>;
    async fn list_documents(&self) -> Result<Vec<DocumentInfo>>;
    /// Returns `false` when the document did not exist.
    async fn delete_document(&self, document_id: &str) -> Result<bool>;
}

/// A document as listed by [`DocumentStore::find_entries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub document: Value,
}

/// A schemaless document database: JSON documents keyed by collection and id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<()>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;
    /// Equality match on top-level fields; `Value::Null` matches everything.
    async fn find_entries(&self, collection: &str, filter: Value) -> Result<Vec<StoredDocument>>;
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    async fn find(&self, collection: &str, filter: Value) -> Result<Vec<Value>> {
        Ok(self
            .find_entries(collection, filter)
            .await?
            .into_iter()
            .map(|entry| entry.document)
            .collect())
    }

    async fn count(&self, collection: &str, filter: Value) -> Result<usize> {
        Ok(self.find(collection, filter).await?.len())
    }
}

pub fn matches_filter(doc: &Value, filter: &Value) -> bool {
    if filter.is_null() {
        return true;
    }
    let Some(filter) = filter.as_object() else {
        return false;
    };
    let Some(obj) = doc.as_object() else {
        return false;
    };
    filter.iter().all(|(k, v)| obj.get(k) == Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_top_level_equality() {
        let doc = json!({"user_id": "u1", "n": 2});
        assert!(matches_filter(&doc, &Value::Null));
        assert!(matches_filter(&doc, &json!({"user_id": "u1"})));
        assert!(!matches_filter(&doc, &json!({"user_id": "u2"})));
        assert!(!matches_filter(&doc, &json!({"missing": 1})));
        assert!(!matches_filter(&json!([1]), &json!({"user_id": "u1"})));
    }
}
