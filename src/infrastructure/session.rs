// Admin Sessions - server-side session marker resolved on every request

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// An authenticated console session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub token: String,
    pub email: String,
    pub login_time: DateTime<Utc>,
}

/// Live sessions keyed by bearer token. Sessions never expire on their own;
/// they end on logout or process restart.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, AdminSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, email: &str) -> AdminSession {
        let session = AdminSession {
            token: generate_token(),
            email: email.to_string(),
            login_time: Utc::now(),
        };
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());
        info!("Admin session opened for {}", email);
        session
    }

    pub async fn get(&self, token: &str) -> Option<AdminSession> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Remove a session; returns it if it existed.
    pub async fn remove(&self, token: &str) -> Option<AdminSession> {
        let removed = self.sessions.write().await.remove(token);
        if let Some(session) = &removed {
            info!("Admin session closed for {}", session.email);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// 32 random bytes, URL-safe base64 without padding.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}
