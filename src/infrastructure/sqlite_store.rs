use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tokio::sync::watch;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{
    generate_document_id, ChangeFeed, Collection, Document, DocumentData, DocumentStore,
};

/// SQLite implementation of the document store: one table, JSON text bodies
pub struct SqliteDocumentStore {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteDocumentStore {
    /// Connect to `url` (e.g. `sqlite:data/conference_admin.db`), creating the
    /// file and schema when missing.
    pub async fn connect(url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid DATABASE_URL {}: {}", url, e)))?
            .create_if_missing(true);

        // every connection to `:memory:` would see its own database
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error(&format!("Failed to connect to {}", url), e))?;

        let store = Self {
            pool,
            feed: ChangeFeed::new(),
        };
        store.initialize().await?;
        info!("SQLite document store ready at {}", url);
        Ok(store)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Create the documents table if it does not exist yet
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                time_created INTEGER NOT NULL,
                time_updated INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to create documents table", e))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to create collection index", e))?;

        Ok(())
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> AppResult<Document> {
        let id: String = row.get("id");
        let raw: String = row.get("data");
        let data = match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => map,
            other => {
                return Err(AppError::DatabaseError(format!(
                    "Document {} is not a JSON object: {}",
                    id, other
                )))
            }
        };
        Ok(Document::new(id, data))
    }
}

/// Translate sqlx failures into the store error taxonomy.
fn map_sqlx_error(context: &str, e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            AppError::ServiceUnavailable(format!("{}: {}", context, e))
        }
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_lowercase();
            if message.contains("readonly") || message.contains("read-only") || message.contains("permission") {
                AppError::PermissionDenied(format!("{}: {}", context, e))
            } else {
                AppError::DatabaseError(format!("{}: {}", context, e))
            }
        }
        _ => AppError::DatabaseError(format!("{}: {}", context, e)),
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn list(&self, collection: Collection) -> AppResult<Vec<Document>> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ? ORDER BY rowid")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&format!("Failed to list {}", collection), e))?;

        rows.iter().map(Self::row_to_document).collect()
    }

    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<Document>> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&format!("Failed to get {}/{}", collection, id), e))?;

        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn count(&self, collection: Collection) -> AppResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&format!("Failed to count {}", collection), e))?;
        Ok(count as usize)
    }

    async fn add(&self, collection: Collection, data: DocumentData) -> AppResult<Document> {
        let id = generate_document_id();
        let now = now_millis();
        sqlx::query(
            "INSERT INTO documents (collection, id, data, time_created, time_updated) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection.as_str())
        .bind(&id)
        .bind(serde_json::to_string(&data)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(&format!("Failed to add document to {}", collection), e))?;

        self.feed.notify(collection);
        Ok(Document::new(id, data))
    }

    async fn set(&self, collection: Collection, id: &str, data: DocumentData) -> AppResult<()> {
        let now = now_millis();
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, time_created, time_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, time_updated = excluded.time_updated
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(serde_json::to_string(&data)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(&format!("Failed to set {}/{}", collection, id), e))?;

        self.feed.notify(collection);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, data: DocumentData) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin transaction", e))?;

        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(&format!("Failed to read {}/{}", collection, id), e))?
            .ok_or_else(|| AppError::NotFound(format!("No document {} in {}", id, collection)))?;

        let mut existing = Self::row_to_document(&row)?;
        for (key, value) in data {
            existing.data.insert(key, value);
        }

        sqlx::query("UPDATE documents SET data = ?, time_updated = ? WHERE collection = ? AND id = ?")
            .bind(serde_json::to_string(&existing.data)?)
            .bind(now_millis())
            .bind(collection.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(&format!("Failed to update {}/{}", collection, id), e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit transaction", e))?;

        self.feed.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(&format!("Failed to delete {}/{}", collection, id), e))?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.feed.notify(collection);
        }
        Ok(removed)
    }

    fn subscribe(&self, collection: Collection) -> watch::Receiver<u64> {
        self.feed.subscribe(collection)
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Database health check failed", e))?;
        Ok(())
    }
}
