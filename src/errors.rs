use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("Action reserved to administrators")]
    Forbidden,

    // Resource errors
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    // Password recovery errors
    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid one-time code")]
    InvalidCode,

    #[error("One-time code has expired")]
    CodeExpired,

    // Incident lifecycle
    #[error("Cannot move incident from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // Notification transport
    #[error("Failed to deliver email: {0}")]
    DeliveryFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cryptographic error: {0}")]
    Cryptographic(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

// Malformed bodies, forms, queries and path segments all surface as 400s
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Conflict(_) | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PasswordMismatch
            | AppError::InvalidCode
            | AppError::CodeExpired
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DeliveryFailed(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Configuration(_)
            | AppError::Cryptographic(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Implement IntoResponse for Axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_message = match &self {
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Configuration(_)
            | AppError::Cryptographic(_)
            | AppError::Internal(_) => {
                tracing::error!(error = ?self, "Request failed");
                "Internal server error".to_string()
            }
            AppError::DeliveryFailed(_) => {
                tracing::error!(error = %self, "Email delivery failed");
                "Failed to deliver email".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Conflict("dup".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound("Incident").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::CodeExpired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::DeliveryFailed("smtp down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unauthorized_sets_challenge_header() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
