use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::{
    config::Config,
    error::AppResult,
    infrastructure::{middleware::HasSessionStore, open_document_store, DocumentStore, SessionStore},
    services::{
        AuthService, DatabaseAdminService, KeynoteSpeakerService, ProgramService, StatisticsService,
        UserDirectory, UserService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub sessions: Arc<SessionStore>,
    pub auth: AuthService,
    pub programs: ProgramService,
    pub statistics: StatisticsService,
    pub users: UserService,
    pub user_directory: Arc<UserDirectory>,
    pub database: DatabaseAdminService,
    pub speakers: KeynoteSpeakerService,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let store = open_document_store(&config.database.url).await?;
        Self::with_store(config, store)
    }

    /// Build the services over an already opened store. Spawns the live user
    /// directory, so it must run inside a tokio runtime.
    pub fn with_store(config: Config, store: Arc<dyn DocumentStore>) -> AppResult<Self> {
        info!("Document store backend: {}", store.backend_name());

        let sessions = Arc::new(SessionStore::new());
        let auth = AuthService::from_config(&config.auth, sessions.clone())?;
        let users = UserService::new(store.clone(), config.conference.name.clone());
        let user_directory = Arc::new(UserDirectory::spawn(
            users.clone(),
            Duration::from_millis(config.users.debounce_ms),
        ));

        Ok(Self {
            programs: ProgramService::new(store.clone()),
            statistics: StatisticsService::new(
                store.clone(),
                config.conference.name.clone(),
                config.statistics.cache_capacity,
                config.statistics.online_window_minutes,
            ),
            database: DatabaseAdminService::new(store.clone()),
            speakers: KeynoteSpeakerService::new(store.clone()),
            users,
            user_directory,
            auth,
            sessions,
            store,
            config,
        })
    }
}

impl HasSessionStore for AppState {
    fn session_store(&self) -> &Arc<SessionStore> {
        &self.sessions
    }
}
