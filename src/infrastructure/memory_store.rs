// In-memory document store - used by tests and `DATABASE_URL=memory`

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{watch, RwLock};

use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{
    generate_document_id, ChangeFeed, Collection, Document, DocumentData, DocumentStore,
};

/// Document store kept in process memory, in insertion order.
///
/// Carries a few fault-injection switches so callers can exercise the
/// permission-denied and unavailable paths without a real backend.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
    feed: ChangeFeed,
    read_failures: AtomicUsize,
    deny_writes: AtomicBool,
    read_calls: AtomicU64,
    write_calls: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` reads fail with `ServiceUnavailable`.
    pub fn fail_next_reads(&self, n: usize) {
        self.read_failures.store(n, Ordering::SeqCst);
    }

    /// Reject every write with `PermissionDenied` while set.
    pub fn set_deny_writes(&self, deny: bool) {
        self.deny_writes.store(deny, Ordering::SeqCst);
    }

    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn begin_read(&self) -> AppResult<()> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AppError::ServiceUnavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn begin_write(&self, collection: Collection) -> AppResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_writes.load(Ordering::SeqCst) {
            return Err(AppError::PermissionDenied(format!(
                "writes to {} are not allowed",
                collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, collection: Collection) -> AppResult<Vec<Document>> {
        self.begin_read()?;
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<Document>> {
        self.begin_read()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn add(&self, collection: Collection, data: DocumentData) -> AppResult<Document> {
        self.begin_write(collection)?;
        let doc = Document::new(generate_document_id(), data);
        {
            let mut collections = self.collections.write().await;
            collections.entry(collection).or_default().push(doc.clone());
        }
        self.feed.notify(collection);
        Ok(doc)
    }

    async fn set(&self, collection: Collection, id: &str, data: DocumentData) -> AppResult<()> {
        self.begin_write(collection)?;
        {
            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection).or_default();
            match docs.iter_mut().find(|doc| doc.id == id) {
                Some(existing) => existing.data = data,
                None => docs.push(Document::new(id, data)),
            }
        }
        self.feed.notify(collection);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, data: DocumentData) -> AppResult<()> {
        self.begin_write(collection)?;
        {
            let mut collections = self.collections.write().await;
            let existing = collections
                .get_mut(&collection)
                .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
                .ok_or_else(|| AppError::NotFound(format!("No document {} in {}", id, collection)))?;
            for (key, value) in data {
                existing.data.insert(key, value);
            }
        }
        self.feed.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<bool> {
        self.begin_write(collection)?;
        let removed = {
            let mut collections = self.collections.write().await;
            match collections.get_mut(&collection) {
                Some(docs) => {
                    let before = docs.len();
                    docs.retain(|doc| doc.id != id);
                    docs.len() < before
                }
                None => false,
            }
        };
        if removed {
            self.feed.notify(collection);
        }
        Ok(removed)
    }

    fn subscribe(&self, collection: Collection) -> watch::Receiver<u64> {
        self.feed.subscribe(collection)
    }
}
