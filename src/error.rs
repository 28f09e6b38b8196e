use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    DatabaseError(String),
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Validation(String),
    SerializationError(String),
    ConfigurationError(String),
    // Store-reported conditions the console turns into friendlier messages
    PermissionDenied(String),
    ServiceUnavailable(String),
    // Destructive-action guards
    ConfirmationMismatch { expected: String },
    ProtectedCollection(String),
    // Security and HTTP errors
    Unauthorized(String),
    AuthRejected(String),
}

impl AppError {
    /// Whether a read that failed this way is worth one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::ServiceUnavailable(_))
    }

    /// Short message an operator sees in the console status line.
    pub fn user_message(&self) -> String {
        match self {
            AppError::PermissionDenied(_) => {
                "Access denied. Please check the document store security configuration.".to_string()
            }
            AppError::ConfirmationMismatch { expected } => {
                format!("Please type '{}' to confirm", expected)
            }
            AppError::ProtectedCollection(name) => {
                format!("Collection '{}' is protected and cannot be cleared", name)
            }
            AppError::ServiceUnavailable(_) => {
                "The document store is unavailable. Please try again.".to_string()
            }
            AppError::Validation(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::AuthRejected(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::ConfirmationMismatch { expected } => {
                write!(f, "Confirmation mismatch: expected '{}'", expected)
            }
            AppError::ProtectedCollection(name) => write!(f, "Protected collection: {}", name),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::AuthRejected(msg) => write!(f, "Authentication rejected: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.user_message()),
            AppError::BadRequest(_) | AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, self.user_message())
            }
            AppError::SerializationError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::ConfigurationError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::PermissionDenied(msg) => {
                tracing::error!("Permission denied by document store: {}", msg);
                (StatusCode::FORBIDDEN, self.user_message())
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, self.user_message())
            }
            AppError::ConfirmationMismatch { .. } => (StatusCode::BAD_REQUEST, self.user_message()),
            AppError::ProtectedCollection(_) => (StatusCode::FORBIDDEN, self.user_message()),
            AppError::Unauthorized(msg) => {
                let body = Json(json!({
                    "error": msg,
                    "status": StatusCode::UNAUTHORIZED.as_u16(),
                    "redirect": "/login"
                }));
                return (StatusCode::UNAUTHORIZED, body).into_response();
            }
            AppError::AuthRejected(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
