// UserDirectory - live merged user list kept current from the change feeds
// One background task per directory; dropping the handle stops it

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::infrastructure::cache::ContentHash;
use crate::infrastructure::document_store::Document;
use crate::models::{AuthUser, MergedUser, UserProfile};
use crate::services::user_service::{merge_users, UserService};

/// Last published merge result.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    pub users: Arc<Vec<MergedUser>>,
    /// Bumped on every publish; 0 until the first load finished
    pub revision: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl DirectorySnapshot {
    pub fn is_loaded(&self) -> bool {
        self.revision > 0
    }
}

pub struct UserDirectory {
    snapshot: watch::Receiver<DirectorySnapshot>,
    _shutdown: oneshot::Sender<()>,
}

impl UserDirectory {
    /// Start watching `users` and `user_profiles`. Bursts of changes closer
    /// together than `debounce` trigger a single reload.
    pub fn spawn(service: UserService, debounce: Duration) -> Self {
        let (publisher, snapshot) = watch::channel(DirectorySnapshot::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(run_directory(service, debounce, publisher, shutdown_rx));

        Self {
            snapshot,
            _shutdown: shutdown_tx,
        }
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DirectorySnapshot> {
        self.snapshot.clone()
    }
}

fn fingerprint(auth_docs: &[Document], profile_docs: &[Document]) -> ContentHash {
    let parts: Vec<Value> = [auth_docs, profile_docs]
        .iter()
        .map(|docs| Value::Array(docs.iter().map(Document::to_json_with_id).collect()))
        .collect();
    ContentHash::of_json(parts.iter())
}

struct Refresher {
    service: UserService,
    publisher: watch::Sender<DirectorySnapshot>,
    last_hash: Option<ContentHash>,
    revision: u64,
}

impl Refresher {
    async fn refresh(&mut self) {
        let (auth_docs, profile_docs) = match self.service.source_documents().await {
            Ok(docs) => docs,
            Err(e) => {
                warn!("User directory reload failed, keeping previous snapshot: {}", e);
                return;
            }
        };

        let hash = fingerprint(&auth_docs, &profile_docs);
        if self.last_hash == Some(hash) {
            debug!("User sources unchanged, skipping merge");
            return;
        }

        let auth: Vec<AuthUser> = auth_docs.iter().map(AuthUser::from_document).collect();
        let profiles: Vec<UserProfile> = profile_docs.iter().map(UserProfile::from_document).collect();
        let users = merge_users(&auth, &profiles);

        self.last_hash = Some(hash);
        self.revision += 1;
        info!("User directory refreshed: {} users (revision {})", users.len(), self.revision);
        self.publisher.send_replace(DirectorySnapshot {
            users: Arc::new(users),
            revision: self.revision,
            refreshed_at: Some(Utc::now()),
        });
    }
}

async fn run_directory(
    service: UserService,
    debounce: Duration,
    publisher: watch::Sender<DirectorySnapshot>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let (mut users_feed, mut profiles_feed) = service.subscribe_sources();
    let mut refresher = Refresher {
        service,
        publisher,
        last_hash: None,
        revision: 0,
    };

    refresher.refresh().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = users_feed.changed() => if changed.is_err() { break },
            changed = profiles_feed.changed() => if changed.is_err() { break },
        }

        // let the burst settle, then fold everything it produced into one reload
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(debounce) => {}
        }
        users_feed.borrow_and_update();
        profiles_feed.borrow_and_update();

        refresher.refresh().await;
    }

    debug!("User directory task stopped");
}
