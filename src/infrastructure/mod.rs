// Core infrastructure modules
pub mod document_store;        // Document store interface and collections
pub mod memory_store;          // In-process backend
pub mod sqlite_store;          // SQLite backend
pub mod store_decorators;      // Retry policy around a backend
pub mod cache;                 // LRU memo and content hashing
pub mod session;               // Admin session store
pub mod middleware;            // Session guard and extractor
pub mod auth_client;           // External auth API client

// Re-export core infrastructure components
pub use document_store::{Collection, Document, DocumentData, DocumentStore};
pub use memory_store::MemoryDocumentStore;
pub use sqlite_store::SqliteDocumentStore;
pub use store_decorators::RetryingStore;
pub use cache::{Cache, ContentHash};
pub use session::{AdminSession, SessionStore};
pub use auth_client::{AuthProvider, HttpAuthProvider};

use std::sync::Arc;
use tracing::info;

use crate::error::AppResult;

/// Open the backend named by `DATABASE_URL` and wrap it in the read-retry policy.
pub async fn open_document_store(url: &str) -> AppResult<Arc<dyn DocumentStore>> {
    let backend: Arc<dyn DocumentStore> = if url == "memory" {
        info!("Using in-memory document store");
        Arc::new(MemoryDocumentStore::new())
    } else {
        Arc::new(SqliteDocumentStore::connect(url).await?)
    };
    Ok(Arc::new(RetryingStore::new(backend)))
}
