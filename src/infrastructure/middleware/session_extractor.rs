// Session Extractor - handler access to the current admin session

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::error::AppError;
use crate::infrastructure::session::AdminSession;

/// The authenticated session of the current request.
///
/// Only available on routes behind `require_admin_session`; elsewhere the
/// extraction fails with 401.
#[derive(Debug, Clone)]
pub struct Session(Arc<AdminSession>);

impl std::ops::Deref for Session {
    type Target = AdminSession;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let session = parts
            .extensions
            .get::<Arc<AdminSession>>()
            .map(|session| Session(session.clone()))
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()));

        async move { session }
    }
}
