use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domains::document::{DocumentInfo, DocumentUpload};
use crate::error::{RagDeskError, Result};
use crate::interfaces::providers::KnowledgeProvider;
use crate::services::notifications::Notifier;
use crate::services::sync::StoreSync;
use crate::store::ChatStore;

/// Upload, list and delete the documents the knowledge service holds.
pub struct DocumentLibrary {
    knowledge: Arc<dyn KnowledgeProvider>,
    state: Arc<RwLock<ChatStore>>,
    sync: Option<Arc<StoreSync>>,
    notifier: Notifier,
}

impl DocumentLibrary {
    pub fn new(
        knowledge: Arc<dyn KnowledgeProvider>,
        state: Arc<RwLock<ChatStore>>,
        sync: Option<Arc<StoreSync>>,
        notifier: Notifier,
    ) -> Self {
        Self {
            knowledge,
            state,
            sync,
            notifier,
        }
    }

    pub async fn upload_path(&self, path: impl AsRef<Path>) -> Result<DocumentInfo> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RagDeskError::Validation(format!("not a file: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RagDeskError::Runtime(format!("reading {}: {e}", path.display())))?;
        self.upload_bytes(file_name, bytes).await
    }

    pub async fn upload_bytes(&self, file_name: impl Into<String>, bytes: Vec<u8>) -> Result<DocumentInfo> {
        let upload = DocumentUpload::new(file_name, bytes);
        if upload.bytes.is_empty() {
            return Err(RagDeskError::Validation(format!("{} is empty", upload.file_name)));
        }
        let name = upload.file_name.clone();
        match self.knowledge.ingest_document(upload).await {
            Ok(info) => {
                self.notifier.info(format!("Uploaded {name}"));
                Ok(info)
            }
            Err(err) => {
                self.notifier.error(format!("Upload of {name} failed: {err}"));
                Err(err)
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<DocumentInfo>> {
        let mut docs = self.knowledge.list_documents().await?;
        docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then_with(|| a.name.cmp(&b.name)));
        Ok(docs)
    }

    /// Deletes a document and detaches it from every chat that used it.
    pub async fn delete(&self, document_id: &str) -> Result<bool> {
        let deleted = self.knowledge.delete_document(document_id).await?;

        let touched = {
            let mut guard = self.state.write().await;
            let ids = guard.detach_document(document_id);
            ids.iter()
                .filter_map(|id| guard.chat(id).cloned())
                .collect::<Vec<_>>()
        };
        if let Some(sync) = &self.sync {
            for chat in &touched {
                if let Err(err) = sync.persist_chat(chat).await {
                    self.notifier
                        .warn(format!("Could not save chat '{}': {err}", chat.title));
                }
            }
        }

        if deleted {
            self.notifier.info(format!("Deleted document {document_id}"));
        } else {
            self.notifier
                .warn(format!("Document {document_id} was already gone"));
        }
        Ok(deleted)
    }
}
