//! Error handling for the application

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::booking::checkout::CheckoutError;
use crate::booking::responses::ErrorResponse;
use crate::booking::{CatalogError, FlowError, ProviderError, ReferralError};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Database(e) => AppError::Database(e),
            ProviderError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            ProviderError::Data(msg) => AppError::Internal(msg),
            ProviderError::Unavailable(msg) => AppError::Unavailable(msg),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Provider(e) => e.into(),
            other => AppError::NotFound(other.to_string()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::SelectionLocked(_) => AppError::Conflict(err.to_string()),
            CheckoutError::Catalog(e) => e.into(),
            CheckoutError::Referral(e) => e.into(),
        }
    }
}

impl From<ReferralError> for AppError {
    fn from(err: ReferralError) -> Self {
        match err {
            ReferralError::EmptyCode => AppError::BadRequest(err.to_string()),
            ReferralError::Provider(e) => e.into(),
        }
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Validation(e) => AppError::Validation(e.to_string()),
            FlowError::Transition(e) => AppError::Conflict(e.to_string()),
            FlowError::MissingReservation => AppError::Conflict(err.to_string()),
            FlowError::Commitment(_) | FlowError::Registration(_) | FlowError::Identity(_) => {
                tracing::error!("Booking flow error: {}", err);
                AppError::Unavailable(err.to_string())
            }
        }
    }
}

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "invalid_state"),
            AppError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
