use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::db::store::StoreError;

/// Failures of the availability and booking core.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("invalid time format: {0}")]
    InvalidFormat(String),

    #[error("that time slot is no longer available, please pick a different time")]
    SlotNoLongerAvailable,

    #[error("slot not offered: {0}")]
    SlotNotOffered(String),

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("appointment {0} kept changing, try again")]
    ConcurrentModification(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => BookingError::StoreUnavailable(msg),
            StoreError::Corrupt { key, reason } => {
                BookingError::CorruptRecord(format!("{key}: {reason}"))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Booking(e) => match e {
                BookingError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
                BookingError::Validation(_) => StatusCode::BAD_REQUEST,
                BookingError::SlotNoLongerAvailable => StatusCode::CONFLICT,
                BookingError::InvalidTransition { .. } => StatusCode::CONFLICT,
                BookingError::SlotNotOffered(_) => StatusCode::UNPROCESSABLE_ENTITY,
                BookingError::NotFound(_) => StatusCode::NOT_FOUND,
                BookingError::ConcurrentModification(_) => StatusCode::SERVICE_UNAVAILABLE,
                BookingError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                BookingError::CorruptRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Booking(e.into())
    }
}
