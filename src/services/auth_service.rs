// AuthService - admin login against the allow-list, then the external auth API

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AdminCredential, AuthConfig};
use crate::error::{AppError, AppResult};
use crate::infrastructure::auth_client::{AuthProvider, HttpAuthProvider};
use crate::infrastructure::session::{AdminSession, SessionStore};

pub const INVALID_ADMIN_CREDENTIALS: &str =
    "Invalid admin credentials. Please check your email and password.";

/// Where a login was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginSource {
    AllowList,
    External,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub success: bool,
    pub message: String,
    pub source: LoginSource,
    pub session: AdminSession,
}

#[derive(Clone)]
pub struct AuthService {
    credentials: Vec<AdminCredential>,
    provider: Option<Arc<dyn AuthProvider>>,
    sessions: Arc<SessionStore>,
}

impl AuthService {
    pub fn from_config(config: &AuthConfig, sessions: Arc<SessionStore>) -> AppResult<Self> {
        let provider: Option<Arc<dyn AuthProvider>> = match &config.api_base_url {
            Some(base_url) => Some(Arc::new(HttpAuthProvider::new(
                base_url.clone(),
                Duration::from_secs(config.timeout_secs),
            )?)),
            None => None,
        };
        Ok(Self::new(config.admin_credentials.clone(), provider, sessions))
    }

    pub fn new(
        credentials: Vec<AdminCredential>,
        provider: Option<Arc<dyn AuthProvider>>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        if credentials.is_empty() && provider.is_none() {
            warn!("No admin credentials and no auth endpoint configured; every login will fail");
        }
        Self {
            credentials,
            provider,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    fn in_allow_list(&self, email: &str, password: &str) -> bool {
        self.credentials
            .iter()
            .any(|c| c.email == email && c.password == password)
    }

    fn require_fields(email: &str, password: &str) -> AppResult<()> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Please enter both email and password".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        Self::require_fields(email, password)?;

        let source = if self.in_allow_list(email, password) {
            LoginSource::AllowList
        } else if let Some(provider) = &self.provider {
            provider.login(email, password).await?;
            LoginSource::External
        } else {
            warn!("Rejected admin login for {}", email);
            return Err(AppError::Unauthorized(INVALID_ADMIN_CREDENTIALS.to_string()));
        };

        let session = self.sessions.create(email).await;
        info!("Admin {} logged in ({:?})", email, source);
        Ok(LoginOutcome {
            success: true,
            message: "Login successful".to_string(),
            source,
            session,
        })
    }

    pub async fn signup(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        Self::require_fields(email, password)?;
        let provider = self.provider.as_ref().ok_or_else(|| {
            AppError::ConfigurationError("Sign up requires AUTH_API_URL to be configured".to_string())
        })?;

        provider.signup(email, password).await?;
        let session = self.sessions.create(email).await;
        info!("Admin {} signed up", email);
        Ok(LoginOutcome {
            success: true,
            message: "Sign up successful".to_string(),
            source: LoginSource::External,
            session,
        })
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.remove(token).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingProvider {
        calls: AtomicUsize,
        reject_with: Option<String>,
    }

    #[async_trait]
    impl AuthProvider for RecordingProvider {
        async fn login(&self, _email: &str, _password: &str) -> AppResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reject_with {
                Some(msg) => Err(AppError::AuthRejected(msg.clone())),
                None => Ok(json!({"ok": true})),
            }
        }

        async fn signup(&self, email: &str, password: &str) -> AppResult<Value> {
            self.login(email, password).await
        }
    }

    fn admin() -> Vec<AdminCredential> {
        vec![AdminCredential {
            email: "admin@rif.dz".into(),
            password: "s3cret".into(),
        }]
    }

    #[tokio::test]
    async fn test_allow_list_skips_provider() {
        let provider = Arc::new(RecordingProvider::default());
        let service = AuthService::new(admin(), Some(provider.clone()), Arc::new(SessionStore::new()));

        let outcome = service.login("admin@rif.dz", "s3cret").await.unwrap();
        assert_eq!(outcome.source, LoginSource::AllowList);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(service.sessions().get(&outcome.session.token).await.is_some());
    }

    #[tokio::test]
    async fn test_allow_list_is_case_sensitive() {
        let service = AuthService::new(admin(), None, Arc::new(SessionStore::new()));
        let err = service.login("Admin@rif.dz", "s3cret").await.unwrap_err();
        assert_eq!(err.user_message(), INVALID_ADMIN_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_provider_rejection_is_verbatim() {
        let provider = Arc::new(RecordingProvider {
            reject_with: Some("User not found".into()),
            ..Default::default()
        });
        let service = AuthService::new(admin(), Some(provider.clone()), Arc::new(SessionStore::new()));
        let err = service.login("other@rif.dz", "pw").await.unwrap_err();
        assert_eq!(err.user_message(), "User not found");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.sessions().len().await, 0);
    }

    #[tokio::test]
    async fn test_external_login_and_logout() {
        let provider = Arc::new(RecordingProvider::default());
        let service = AuthService::new(Vec::new(), Some(provider), Arc::new(SessionStore::new()));
        let outcome = service.login("other@rif.dz", "pw").await.unwrap();
        assert_eq!(outcome.source, LoginSource::External);

        assert!(service.logout(&outcome.session.token).await);
        assert!(!service.logout(&outcome.session.token).await);
    }

    #[tokio::test]
    async fn test_signup_requires_endpoint() {
        let service = AuthService::new(admin(), None, Arc::new(SessionStore::new()));
        let err = service.signup("new@rif.dz", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::ConfigurationError(_)));
        assert!(service.login("", "pw").await.is_err());
    }
}
