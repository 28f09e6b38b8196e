// External Auth Client - login/signup proxied to the platform's auth API

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// Credential check performed by an external service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns the provider's response body on success.
    async fn login(&self, email: &str, password: &str) -> AppResult<Value>;
    async fn signup(&self, email: &str, password: &str) -> AppResult<Value>;
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

/// `AuthProvider` speaking JSON over HTTP to `{base}/auth/login` and
/// `{base}/auth/signup`.
pub struct HttpAuthProvider {
    client: Client,
    base_url: String,
}

impl HttpAuthProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigurationError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post_credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
        fallback_message: &str,
    ) -> AppResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&CredentialsBody { email, password })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::ServiceUnavailable(format!("Auth request timeout: {}", e))
                } else if e.is_connect() {
                    AppError::ServiceUnavailable(format!("Failed to connect to auth service: {}", e))
                } else {
                    AppError::ServiceUnavailable(format!("Auth request failed: {}", e))
                }
            })?;

        let status = response.status();
        // error bodies are best-effort JSON
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            warn!("Auth service answered {} for {}", status, path);
            return Err(AppError::AuthRejected(rejection_message(&body, fallback_message)));
        }
        Ok(body)
    }
}

impl fmt::Debug for HttpAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuthProvider")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn login(&self, email: &str, password: &str) -> AppResult<Value> {
        self.post_credentials("/auth/login", email, password, "Login failed")
            .await
    }

    async fn signup(&self, email: &str, password: &str) -> AppResult<Value> {
        self.post_credentials("/auth/signup", email, password, "Sign up failed")
            .await
    }
}

/// The body's `message` verbatim, or the fallback when there is none.
fn rejection_message(body: &Value, fallback: &str) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejection_message_prefers_body() {
        let body = json!({"message": "Email not verified"});
        assert_eq!(rejection_message(&body, "Login failed"), "Email not verified");
    }

    #[test]
    fn test_rejection_message_fallbacks() {
        assert_eq!(rejection_message(&Value::Null, "Login failed"), "Login failed");
        assert_eq!(rejection_message(&json!({"message": ""}), "Sign up failed"), "Sign up failed");
        assert_eq!(rejection_message(&json!({"message": 42}), "Login failed"), "Login failed");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = HttpAuthProvider::new("http://auth.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.base_url, "http://auth.local");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // port 9 (discard) is closed on test machines
        let provider = HttpAuthProvider::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = provider.login("a@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }
}
