use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::interfaces::providers::{DocumentStore, StoredDocument};
use crate::services::notifications::Notifier;

/// Local store mirrored to a remote one.
///
/// The local copy is authoritative for writes: a local failure is returned,
/// a remote failure is reported through the notifier and otherwise ignored.
/// Reads go to the remote first and fall back to the local copy. Listings
/// also include local documents the remote lacks, which are pushed back to it.
pub struct MirroredDocumentStore {
    local: Arc<dyn DocumentStore>,
    remote: Arc<dyn DocumentStore>,
    notifier: Notifier,
}

impl MirroredDocumentStore {
    pub fn new(
        local: Arc<dyn DocumentStore>,
        remote: Arc<dyn DocumentStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            local,
            remote,
            notifier,
        }
    }
}

#[async_trait]
impl DocumentStore for MirroredDocumentStore {
    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        self.local.put(collection, id, doc.clone()).await?;
        if let Err(err) = self.remote.put(collection, id, doc).await {
            self.notifier
                .warn(format!("Could not sync {collection}/{id} to remote store: {err}"));
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        match self.remote.get(collection, id).await {
            Ok(Some(doc)) => Ok(Some(doc)),
            Ok(None) => self.local.get(collection, id).await,
            Err(err) => {
                tracing::warn!(collection, id, error = %err, "remote read failed, using local copy");
                self.local.get(collection, id).await
            }
        }
    }

    async fn find_entries(&self, collection: &str, filter: Value) -> Result<Vec<StoredDocument>> {
        let local = self.local.find_entries(collection, filter.clone()).await?;
        let mut merged = match self.remote.find_entries(collection, filter).await {
            Ok(entries) => entries,
            Err(err) => {
                self.notifier.warn(format!(
                    "Remote store unavailable, showing local {collection}: {err}"
                ));
                return Ok(local);
            }
        };

        let known: HashSet<String> = merged.iter().map(|e| e.id.clone()).collect();
        for entry in local.into_iter().filter(|e| !known.contains(&e.id)) {
            match self.remote.put(collection, &entry.id, entry.document.clone()).await {
                Ok(()) => tracing::debug!(collection, id = %entry.id, "pushed local-only document to remote"),
                Err(err) => {
                    tracing::warn!(collection, id = %entry.id, error = %err, "could not push local-only document")
                }
            }
            merged.push(entry);
        }
        Ok(merged)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let local = self.local.delete(collection, id).await?;
        let remote = match self.remote.delete(collection, id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                self.notifier
                    .warn(format!("Could not delete {collection}/{id} remotely: {err}"));
                false
            }
        };
        Ok(local || remote)
    }
}
