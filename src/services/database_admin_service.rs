// DatabaseAdminService - collection counts, exports and confirmation-gated cleanup

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{Collection, DocumentStore};
use crate::services::export::{export_backup, export_collection, ExportFile, ExportFormat};

/// Phrase that unlocks clearing every non-protected collection at once.
pub const CLEAR_ALL_PHRASE: &str = "CLEAR_ALL_DATA";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionCount {
    pub collection: Collection,
    pub count: usize,
    pub protected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub collections: Vec<CollectionCount>,
    pub total_documents: usize,
}

/// Outcome of a bulk delete. Partial failure is reported, never rolled back.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub deleted: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

impl ClearReport {
    fn absorb(&mut self, other: ClearReport) {
        self.deleted += other.deleted;
        self.failed += other.failed;
        if self.first_error.is_none() {
            self.first_error = other.first_error;
        }
    }
}

#[derive(Clone)]
pub struct DatabaseAdminService {
    store: Arc<dyn DocumentStore>,
}

impl DatabaseAdminService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn collection_stats(&self) -> AppResult<DatabaseStats> {
        let counts = join_all(Collection::ALL.iter().map(|c| self.store.count(*c))).await;

        let mut collections = Vec::with_capacity(counts.len());
        for (collection, count) in Collection::ALL.into_iter().zip(counts) {
            collections.push(CollectionCount {
                collection,
                count: count?,
                protected: collection.is_delete_protected(),
            });
        }
        let total_documents = collections.iter().map(|c| c.count).sum();
        Ok(DatabaseStats {
            collections,
            total_documents,
        })
    }

    pub async fn export(&self, collection: Collection, format: ExportFormat) -> AppResult<ExportFile> {
        let docs = self.store.list(collection).await?;
        let file = export_collection(collection, &docs, format, &Utc::now())?;
        info!(
            "Exported {} {} documents as {}",
            docs.len(),
            collection,
            format.extension()
        );
        Ok(file)
    }

    pub async fn export_all(&self, format: ExportFormat) -> AppResult<Vec<ExportFile>> {
        let lists = join_all(Collection::ALL.iter().map(|c| self.store.list(*c))).await;
        let mut collections = Vec::with_capacity(lists.len());
        for (collection, docs) in Collection::ALL.into_iter().zip(lists) {
            collections.push((collection, docs?));
        }
        let files = export_backup(&collections, format, &Utc::now())?;
        info!("Exported complete database backup as {} file(s)", files.len());
        Ok(files)
    }

    /// Delete every document of one collection.
    ///
    /// Protected collections are refused before the confirmation is read;
    /// a wrong confirmation returns without touching the store.
    pub async fn clear_collection(&self, collection: Collection, confirmation: &str) -> AppResult<ClearReport> {
        if collection.is_delete_protected() {
            warn!("Refused to clear protected collection {}", collection);
            return Err(AppError::ProtectedCollection(collection.to_string()));
        }
        let expected = collection.clear_phrase();
        if confirmation != expected {
            return Err(AppError::ConfirmationMismatch { expected });
        }

        let report = self.delete_all_in(collection).await?;
        info!(
            "Cleared {}: {} deleted, {} failed",
            collection, report.deleted, report.failed
        );
        Ok(report)
    }

    /// Delete every document of every clearable collection in one batch.
    ///
    /// A collection that fails does not stop or undo the others.
    pub async fn clear_all(&self, confirmation: &str) -> AppResult<ClearReport> {
        if confirmation != CLEAR_ALL_PHRASE {
            return Err(AppError::ConfirmationMismatch {
                expected: CLEAR_ALL_PHRASE.to_string(),
            });
        }

        let collections: Vec<Collection> = Collection::clearable().collect();
        let batches = join_all(collections.iter().map(|c| self.delete_all_in(*c))).await;
        let mut total = ClearReport::default();
        for (collection, batch) in collections.into_iter().zip(batches) {
            match batch {
                Ok(report) => total.absorb(report),
                Err(e) => {
                    // a collection that could not be listed counts as one failure
                    error!("Failed to list {} for clearing: {}", collection, e);
                    total.absorb(ClearReport {
                        deleted: 0,
                        failed: 1,
                        first_error: Some(e.user_message()),
                    });
                }
            }
        }
        info!("Cleared all data: {} deleted, {} failed", total.deleted, total.failed);
        Ok(total)
    }

    async fn delete_all_in(&self, collection: Collection) -> AppResult<ClearReport> {
        let docs = self.store.list(collection).await?;
        let results = join_all(docs.iter().map(|doc| self.store.delete(collection, &doc.id))).await;

        let mut report = ClearReport::default();
        for (doc, result) in docs.iter().zip(results) {
            match result {
                Ok(_) => report.deleted += 1,
                Err(e) => {
                    error!("Failed to delete {}/{}: {}", collection, doc.id, e);
                    report.failed += 1;
                    if report.first_error.is_none() {
                        report.first_error = Some(e.user_message());
                    }
                }
            }
        }
        Ok(report)
    }
}
