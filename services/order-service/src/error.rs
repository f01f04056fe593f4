use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use order_types::errors::ValidationError;
use order_types::ids::OrderId;
use thiserror::Error;

use crate::ingestion::IngestionError;
use crate::models::ErrorResponse;

/// Central error type for the HTTP surface
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Malformed request: {message}")]
    MalformedRequest { status: StatusCode, message: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Queue unavailable for order {order_id}: {message}")]
    QueueUnavailable { order_id: OrderId, message: String },

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<IngestionError> for AppError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Invalid(err) => AppError::Validation(err),
            IngestionError::StoreUnavailable(err) => AppError::StoreUnavailable(err.to_string()),
            IngestionError::QueueUnavailable { order_id, source } => AppError::QueueUnavailable {
                order_id,
                message: source.to_string(),
            },
            IngestionError::Encode(err) => AppError::InternalError(err.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut field = None;
        let mut order_id = None;

        let (status, message, code) = match self {
            AppError::MalformedRequest { status, message } => (status, message, "MALFORMED_REQUEST"),
            AppError::Validation(err) => {
                field = Some(err.field().to_string());
                (StatusCode::BAD_REQUEST, err.to_string(), "VALIDATION_FAILED")
            }
            AppError::StoreUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg, "STORE_UNAVAILABLE")
            }
            AppError::QueueUnavailable { order_id: id, message } => {
                order_id = Some(id.to_string());
                (StatusCode::BAD_GATEWAY, message, "QUEUE_UNAVAILABLE")
            }
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message,
            field,
            order_id,
        });

        (status, body).into_response()
    }
}
