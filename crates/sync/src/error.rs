//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; clients get a JSON body of the form
//! `{"ok": false, "error": "..."}` that never carries internal details.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::{CheckoutError, PropagationError, WebhookError};

/// Application-level error type for the sync service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Webhook processing failed.
    #[error("Propagation error: {0}")]
    Propagation(#[from] PropagationError),

    /// Webhook authentication failed.
    #[error("Webhook rejected: {0}")]
    Webhook(#[from] WebhookError),

    /// Cart could not be validated.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Propagation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Webhook(_) => StatusCode::UNAUTHORIZED,
            Self::Checkout(CheckoutError::EmptyCart) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Checkout(CheckoutError::DataIntegrity(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Propagation(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Data-integrity failures carry the full verdict
        if let Self::Checkout(CheckoutError::DataIntegrity(result)) = self {
            return (status, Json(result)).into_response();
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Propagation(_) => "Internal server error".to_string(),
            Self::Webhook(_) => "Unauthorized".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use shopfleet_core::{MarketCode, ProductId, ValidationResult};

    use super::*;
    use crate::db::RepositoryError;

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::Webhook(WebhookError::InvalidSignature)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::DataIntegrity(Box::new(
                ValidationResult::data_integrity(MarketCode::new("US"), &[ProductId::new("p1")])
            )))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Propagation(PropagationError::CanonicalWrite(
                RepositoryError::NotFound
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
