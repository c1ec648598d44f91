//! Unified error handling for admin.
//!
//! Pages get a plain error page, `/api` handlers wrap errors in
//! [`JsonError`]. Server-side failures are captured to Sentry.

use askama::Template;
use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use dewy_db::RepositoryError;

use crate::services::auth::AdminAuthError;
use crate::storage::StorageError;

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed or a business rule refused it.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Sign-in failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AdminAuthError),

    /// Object storage failed or is not configured.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Validation(_) => StatusCode::BAD_REQUEST,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AdminAuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AdminAuthError::NotAdmin => StatusCode::FORBIDDEN,
                AdminAuthError::InvalidEmail(_)
                | AdminAuthError::WeakPassword(_)
                | AdminAuthError::InvalidName(_) => StatusCode::BAD_REQUEST,
                AdminAuthError::Repository(_) | AdminAuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Storage(err) => match err {
                StorageError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                StorageError::Http(_) | StorageError::Api { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(
                RepositoryError::Conflict(msg) | RepositoryError::Validation(msg),
            ) => msg.clone(),
            Self::Auth(AdminAuthError::InvalidCredentials | AdminAuthError::InvalidEmail(_)) => {
                "Invalid email or password".to_string()
            }
            Self::Auth(AdminAuthError::NotAdmin) => {
                "This account does not have back-office access".to_string()
            }
            Self::Auth(AdminAuthError::WeakPassword(msg) | AdminAuthError::InvalidName(msg)) => {
                msg.clone()
            }
            Self::Storage(StorageError::NotConfigured) => {
                "Image uploads are not configured".to_string()
            }
            Self::Storage(_) => "External service error".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Forbidden(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::Database(_) | Self::Auth(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    fn report(&self) {
        if self.status().is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }
    }
}

/// Error page template.
#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    status: u16,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.report();

        let status = self.status();
        let message = self.public_message();
        let page = ErrorTemplate {
            status: status.as_u16(),
            message: message.clone(),
        };

        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (status, message).into_response()
            }
        }
    }
}

/// JSON flavour of [`AppError`] for `/api` handlers: `{"error": "..."}`.
#[derive(Debug)]
pub struct JsonError(pub AppError);

impl<E> From<E> for JsonError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        self.0.report();
        let status = self.0.status();
        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Associate subsequent Sentry events with the signed-in admin.
pub fn set_sentry_user(user_id: &impl ToString, email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Forget the Sentry user (logout).
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| scope.set_user(None));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = AppError::NotFound("Coupon".to_string());
        assert_eq!(err.to_string(), "Not found: Coupon");
        assert_eq!(err.public_message(), "Coupon not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_transition_refusal_is_bad_request() {
        let err = AppError::from(RepositoryError::Validation(
            "cannot move an order from shipped to cancelled".to_string(),
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.public_message(),
            "cannot move an order from shipped to cancelled"
        );
    }

    #[test]
    fn test_customer_login_is_forbidden() {
        let err = AppError::from(AdminAuthError::NotAdmin);
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let err = AppError::from(AdminAuthError::InvalidCredentials);
        assert_eq!(err.public_message(), "Invalid email or password");
    }

    #[test]
    fn test_storage_errors() {
        let err = AppError::from(StorageError::NotConfigured);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let err = AppError::from(StorageError::Api {
            status: 500,
            message: "bucket missing".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.public_message(), "External service error");
    }

    #[tokio::test]
    async fn test_json_error_body() {
        let response =
            JsonError::from(AppError::BadRequest("unsupported image type".to_string()))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "unsupported image type");
    }
}
