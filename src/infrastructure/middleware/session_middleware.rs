// Session Middleware - resolves the bearer token into an AdminSession
// Handlers behind this layer only ever see an authenticated session

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::error::AppError;
use crate::infrastructure::session::SessionStore;

/// Trait for application state that carries the session store
pub trait HasSessionStore {
    fn session_store(&self) -> &Arc<SessionStore>;
}

/// Rejects requests without a live session (401, redirect to `/login`) and
/// injects `Arc<AdminSession>` into request extensions otherwise.
pub async fn require_admin_session<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    T: HasSessionStore + Clone + Send + Sync + 'static,
{
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let session = app_state
        .session_store()
        .get(&token)
        .await
        .ok_or_else(|| AppError::Unauthorized("Session expired or invalid".to_string()))?;

    debug!("{} {} as {}", request.method(), request.uri().path(), session.email);
    request.extensions_mut().insert(Arc::new(session));

    Ok(next.run(request).await)
}

/// Token from `Authorization: Bearer <token>`, if present and non-empty
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
