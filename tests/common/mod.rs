#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;

use ragdesk::domains::document::{Chunk, ChunkQuery, DocumentInfo, DocumentUpload, SummaryRequest};
use ragdesk::error::{RagDeskError, Result};
use ragdesk::interfaces::providers::{ChatEvent, ChatTurn, KnowledgeProvider, LlmProvider};

/// What one streamed reply does.
#[derive(Clone)]
pub enum Script {
    Deltas(Vec<&'static str>),
    /// Some deltas, then an error.
    FailAfter(Vec<&'static str>),
}

pub struct MockLlm {
    scripts: Mutex<VecDeque<Script>>,
    texts: Mutex<VecDeque<Result<String>>>,
    pub default_text: String,
    pub turns_seen: Mutex<Vec<Vec<ChatTurn>>>,
    pub prompts_seen: Mutex<Vec<(String, String)>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            texts: Mutex::new(VecDeque::new()),
            default_text: "- generated point".to_string(),
            turns_seen: Mutex::new(Vec::new()),
            prompts_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_scripts(scripts: Vec<Script>) -> Self {
        let llm = Self::new();
        *llm.scripts.lock().unwrap() = scripts.into();
        llm
    }

    pub fn push_text(&self, text: Result<String>) {
        self.texts.lock().unwrap().push_back(text);
    }

    pub fn last_turns(&self) -> Vec<ChatTurn> {
        self.turns_seen.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn stream_calls(&self) -> usize {
        self.turns_seen.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> Result<String> {
        self.prompts_seen
            .lock()
            .unwrap()
            .push((prompt.to_string(), system_prompt.to_string()));
        let next = self.texts.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.default_text.clone()))
    }

    fn chat_stream(&self, turns: Vec<ChatTurn>) -> BoxStream<'static, Result<ChatEvent>> {
        self.turns_seen.lock().unwrap().push(turns);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Deltas(vec!["ok"]));
        Box::pin(try_stream! {
            match script {
                Script::Deltas(deltas) => {
                    for delta in deltas {
                        yield ChatEvent::Delta(delta.to_string());
                    }
                    yield ChatEvent::Done { finish_reason: Some("stop".to_string()) };
                }
                Script::FailAfter(deltas) => {
                    for delta in deltas {
                        yield ChatEvent::Delta(delta.to_string());
                    }
                    Err::<(), _>(RagDeskError::Http("connection reset".to_string()))?;
                }
            }
        })
    }
}

pub fn chunk(document_id: &str, name: &str, text: &str, score: f32) -> Chunk {
    Chunk {
        document_id: document_id.to_string(),
        document_name: Some(name.to_string()),
        text: text.to_string(),
        score,
        context_before: None,
        context_after: None,
        page: Some(1),
    }
}

pub struct MockKnowledge {
    pub chunks: Vec<Chunk>,
    pub summary: String,
    pub fail: bool,
    pub documents: Mutex<Vec<DocumentInfo>>,
    pub queries: Mutex<Vec<ChunkQuery>>,
    pub summaries: Mutex<Vec<SummaryRequest>>,
}

impl MockKnowledge {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            summary: "short summary".to_string(),
            fail: false,
            documents: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            summaries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            Err(RagDeskError::Http("status 503: unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KnowledgeProvider for MockKnowledge {
    async fn retrieve_chunks(&self, query: &ChunkQuery) -> Result<Vec<Chunk>> {
        self.queries.lock().unwrap().push(query.clone());
        self.check()?;
        Ok(self.chunks.clone())
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String> {
        self.summaries.lock().unwrap().push(request.clone());
        self.check()?;
        Ok(self.summary.clone())
    }

    async fn ingest_document(&self, upload: DocumentUpload) -> Result<DocumentInfo> {
        self.check()?;
        let mut docs = self.documents.lock().unwrap();
        let info = DocumentInfo {
            id: format!("doc-{}", docs.len() + 1),
            name: upload.file_name,
            size_bytes: Some(upload.bytes.len() as u64),
            uploaded_at: Some(docs.len() as i64),
            status: Some("ready".to_string()),
            chunk_count: None,
        };
        docs.push(info.clone());
        Ok(info)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        self.check()?;
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        self.check()?;
        let mut docs = self.documents.lock().unwrap();
        let before = docs.len();
        docs.retain(|d| d.id != document_id);
        Ok(docs.len() != before)
    }
}
