// Store Decorators - policies layered around a DocumentStore backend
// Each decorator owns an inner store and forwards what it does not change

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

use crate::error::AppResult;
use crate::infrastructure::document_store::{Collection, Document, DocumentData, DocumentStore};

/// Pause before the second attempt of a read
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_millis(200);

/// Retry Decorator - one more attempt for reads that failed transiently.
///
/// Writes pass straight through: a write that timed out may still have been
/// applied, so it is never replayed.
pub struct RetryingStore {
    inner: Arc<dyn DocumentStore>,
    pause: Duration,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self::with_pause(inner, DEFAULT_RETRY_PAUSE)
    }

    pub fn with_pause(inner: Arc<dyn DocumentStore>, pause: Duration) -> Self {
        Self { inner, pause }
    }

    async fn read_with_retry<T, F, Fut>(&self, what: &str, operation: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match operation().await {
            Err(e) if e.is_transient() => {
                warn!("{} failed ({}), retrying once", what, e);
                tokio::time::sleep(self.pause).await;
                operation().await
            }
            other => other,
        }
    }
}

#[async_trait]
impl DocumentStore for RetryingStore {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn list(&self, collection: Collection) -> AppResult<Vec<Document>> {
        self.read_with_retry(&format!("list {}", collection), || self.inner.list(collection))
            .await
    }

    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<Document>> {
        self.read_with_retry(&format!("get {}/{}", collection, id), || {
            self.inner.get(collection, id)
        })
        .await
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> AppResult<Vec<Document>> {
        self.read_with_retry(&format!("query {}.{}", collection, field), || {
            self.inner.find_by_field(collection, field, value)
        })
        .await
    }

    async fn count(&self, collection: Collection) -> AppResult<usize> {
        self.read_with_retry(&format!("count {}", collection), || self.inner.count(collection))
            .await
    }

    async fn add(&self, collection: Collection, data: DocumentData) -> AppResult<Document> {
        self.inner.add(collection, data).await
    }

    async fn set(&self, collection: Collection, id: &str, data: DocumentData) -> AppResult<()> {
        self.inner.set(collection, id, data).await
    }

    async fn update(&self, collection: Collection, id: &str, data: DocumentData) -> AppResult<()> {
        self.inner.update(collection, id, data).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<bool> {
        self.inner.delete(collection, id).await
    }

    fn subscribe(&self, collection: Collection) -> watch::Receiver<u64> {
        self.inner.subscribe(collection)
    }

    async fn health_check(&self) -> AppResult<()> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::memory_store::MemoryDocumentStore;

    fn retrying(inner: Arc<MemoryDocumentStore>) -> RetryingStore {
        RetryingStore::with_pause(inner, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_read_retried_once_after_unavailable() {
        let inner = Arc::new(MemoryDocumentStore::new());
        let store = retrying(inner.clone());

        inner.fail_next_reads(1);
        assert!(store.list(Collection::Programs).await.is_ok());
        assert_eq!(inner.read_calls(), 2);
    }

    #[tokio::test]
    async fn test_second_failure_is_reported() {
        let inner = Arc::new(MemoryDocumentStore::new());
        let store = retrying(inner.clone());

        inner.fail_next_reads(2);
        let err = store.list(Collection::Programs).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        assert_eq!(inner.read_calls(), 2);
    }

    #[tokio::test]
    async fn test_writes_are_not_retried() {
        let inner = Arc::new(MemoryDocumentStore::new());
        let store = retrying(inner.clone());

        inner.set_deny_writes(true);
        assert!(store.add(Collection::Programs, DocumentData::new()).await.is_err());
        assert_eq!(inner.write_calls(), 1);
    }
}
