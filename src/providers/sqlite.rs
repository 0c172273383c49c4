use std::path::Path;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde_json::Value;

use crate::error::{RagDeskError, Result};
use crate::interfaces::providers::{matches_filter, DocumentStore, StoredDocument};

mod schema;
use schema::documents;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Insertable)]
#[diesel(table_name = documents)]
struct NewDocument<'a> {
    collection: &'a str,
    doc_id: &'a str,
    body: &'a str,
    updated_at: i64,
}

/// Local document store on a single sqlite file.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| RagDeskError::Runtime(e.to_string()))?;
        tracing::debug!(path = sqlite_path, "sqlite document store ready");
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| RagDeskError::Runtime(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let body = serde_json::to_string(&doc)?;
        let new = NewDocument {
            collection,
            doc_id: id,
            body: &body,
            updated_at: crate::domains::now_ms(),
        };
        let mut conn = self.conn().await?;
        diesel::replace_into(documents::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| RagDeskError::Runtime(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let mut conn = self.conn().await?;
        let body: Option<String> = documents::table
            .filter(documents::collection.eq(collection))
            .filter(documents::doc_id.eq(id))
            .select(documents::body)
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| RagDeskError::Runtime(e.to_string()))?;
        body.map(|b| serde_json::from_str(&b).map_err(RagDeskError::from))
            .transpose()
    }

    async fn find_entries(&self, collection: &str, filter: Value) -> Result<Vec<StoredDocument>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, String)> = documents::table
            .filter(documents::collection.eq(collection))
            .order(documents::doc_id.asc())
            .select((documents::doc_id, documents::body))
            .load(&mut conn)
            .await
            .map_err(|e| RagDeskError::Runtime(e.to_string()))?;

        let mut results = Vec::new();
        for (id, body) in rows {
            let document: Value = serde_json::from_str(&body)?;
            if matches_filter(&document, &filter) {
                results.push(StoredDocument { id, document });
            }
        }
        Ok(results)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(
            documents::table
                .filter(documents::collection.eq(collection))
                .filter(documents::doc_id.eq(id)),
        )
        .execute(&mut conn)
        .await
        .map_err(|e| RagDeskError::Runtime(e.to_string()))?;
        Ok(deleted > 0)
    }
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RagDeskError::Runtime(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| RagDeskError::Runtime(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| RagDeskError::Runtime(e.to_string()))?;
        Ok::<_, RagDeskError>(())
    })
    .await
    .map_err(|e| RagDeskError::Runtime(e.to_string()))??;
    Ok(())
}
