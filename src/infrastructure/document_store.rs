// Document Store Interface - schemaless collections of JSON documents
// Every service talks to storage through this trait only

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;

use crate::error::{AppError, AppResult};

/// Field map of one stored document (the id is kept outside of it).
pub type DocumentData = Map<String, Value>;

/// Named collections the console reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Programs,
    Users,
    UserProfiles,
    Ratings,
    PresentationAnalytics,
    Notifications,
    Questions,
    LiveNotifications,
    PushNotifications,
    KeynoteSpeakers,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Programs,
        Collection::Users,
        Collection::UserProfiles,
        Collection::Ratings,
        Collection::PresentationAnalytics,
        Collection::Notifications,
        Collection::Questions,
        Collection::LiveNotifications,
        Collection::PushNotifications,
        Collection::KeynoteSpeakers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Programs => "programs",
            Collection::Users => "users",
            Collection::UserProfiles => "user_profiles",
            Collection::Ratings => "ratings",
            Collection::PresentationAnalytics => "presentation_analytics",
            Collection::Notifications => "notifications",
            Collection::Questions => "questions",
            Collection::LiveNotifications => "live_notifications",
            Collection::PushNotifications => "push_notifications",
            Collection::KeynoteSpeakers => "keynote_speakers",
        }
    }

    /// User accounts and profiles survive every cleanup, whatever is typed.
    pub fn is_delete_protected(&self) -> bool {
        matches!(self, Collection::Users | Collection::UserProfiles)
    }

    /// Collections wiped by a "clear all" between conference years.
    pub fn clearable() -> impl Iterator<Item = Collection> {
        Self::ALL.into_iter().filter(|c| !c.is_delete_protected())
    }

    /// Exact phrase an operator must type to clear this collection.
    pub fn clear_phrase(&self) -> String {
        format!("CLEAR_{}", self.as_str().to_uppercase())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AppError::NotFound(format!("Unknown collection: {}", s)))
    }
}

/// One stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: DocumentData,
}

impl Document {
    pub fn new(id: impl Into<String>, data: DocumentData) -> Self {
        Self { id: id.into(), data }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// The document as one JSON object with its id under `id`.
    pub fn to_json_with_id(&self) -> Value {
        let mut map = Map::with_capacity(self.data.len() + 1);
        map.insert("id".to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.data {
            if key != "id" {
                map.insert(key.clone(), value.clone());
            }
        }
        Value::Object(map)
    }
}

/// Document store trait implemented by every storage backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    // Reads
    async fn list(&self, collection: Collection) -> AppResult<Vec<Document>>;
    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<Document>>;

    /// Documents whose top-level `field` equals `value`.
    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> AppResult<Vec<Document>> {
        Ok(self
            .list(collection)
            .await?
            .into_iter()
            .filter(|doc| doc.get(field) == Some(value))
            .collect())
    }

    async fn count(&self, collection: Collection) -> AppResult<usize> {
        Ok(self.list(collection).await?.len())
    }

    // Writes
    /// Insert under a store-assigned id.
    async fn add(&self, collection: Collection, data: DocumentData) -> AppResult<Document>;
    /// Insert or replace under a caller-chosen id.
    async fn set(&self, collection: Collection, id: &str, data: DocumentData) -> AppResult<()>;
    /// Merge top-level fields into an existing document; `NotFound` if absent.
    async fn update(&self, collection: Collection, id: &str, data: DocumentData) -> AppResult<()>;
    async fn delete(&self, collection: Collection, id: &str) -> AppResult<bool>;

    /// Revision counter bumped after every write to `collection`.
    fn subscribe(&self, collection: Collection) -> watch::Receiver<u64>;

    /// Connectivity check used by `/health`
    async fn health_check(&self) -> AppResult<()> {
        self.list(Collection::Programs).await.map(|_| ())
    }
}

/// Per-collection revision channels shared by the store implementations.
#[derive(Debug)]
pub struct ChangeFeed {
    senders: HashMap<Collection, watch::Sender<u64>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let senders = Collection::ALL
            .into_iter()
            .map(|c| (c, watch::channel(0u64).0))
            .collect();
        Self { senders }
    }

    pub fn notify(&self, collection: Collection) {
        if let Some(sender) = self.senders.get(&collection) {
            sender.send_modify(|revision| *revision += 1);
        }
    }

    pub fn subscribe(&self, collection: Collection) -> watch::Receiver<u64> {
        match self.senders.get(&collection) {
            Some(sender) => sender.subscribe(),
            // every collection is registered in `new`
            None => watch::channel(0u64).1,
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Fresh store-assigned document id.
pub fn generate_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
