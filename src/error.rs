use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::SqlErr;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product {product_id} is not available")]
    ProductUnavailable {
        product_id: Uuid,
        variant_id: Option<Uuid>,
    },

    #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        variant_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment authorization timed out")]
    PaymentTimeout,

    #[error("Payment provider unavailable: {0}")]
    PaymentUnavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
            _ => AppError::OrmError(err),
        }
    }
}

impl AppError {
    /// Stable machine-readable kind sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidArgument(_) => "invalid_argument",
            AppError::InvalidState(_) => "invalid_state",
            AppError::EmptyCart => "empty_cart",
            AppError::ProductUnavailable { .. } => "product_unavailable",
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::PaymentDeclined(_) => "payment_declined",
            AppError::PaymentTimeout => "payment_timeout",
            AppError::PaymentUnavailable(_) => "payment_unavailable",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidArgument(_) | AppError::EmptyCart => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::InvalidState(_)
            | AppError::ProductUnavailable { .. }
            | AppError::InsufficientStock { .. }
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PaymentUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PaymentTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the same request may succeed if sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::PaymentTimeout | AppError::PaymentUnavailable(_)
        )
    }

    fn detail(&self) -> Option<Value> {
        match self {
            AppError::ProductUnavailable {
                product_id,
                variant_id,
            } => Some(json!({ "product_id": product_id, "variant_id": variant_id })),
            AppError::InsufficientStock {
                product_id,
                variant_id,
                requested,
                available,
            } => Some(json!({
                "product_id": product_id,
                "variant_id": variant_id,
                "requested": requested,
                "available": available,
            })),
            AppError::PaymentTimeout | AppError::PaymentUnavailable(_) => {
                Some(json!({ "retryable": true }))
            }
            AppError::PaymentDeclined(_) => Some(json!({ "retryable": false })),
            _ => None,
        }
    }
}

/// Body of every error envelope.
#[derive(Serialize, ToSchema)]
pub struct ErrorData {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub detail: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            match &self {
                AppError::DbError(err) => tracing::error!(error = %err, "database error"),
                AppError::OrmError(err) => tracing::error!(error = %err, "orm error"),
                AppError::Internal(err) => tracing::error!(error = %err, "internal error"),
                other => tracing::warn!(error = %other, "upstream failure"),
            }
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.kind().to_string(),
                detail: self.detail(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Rejects quantities below one; values are never clamped.
pub fn ensure_positive_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::InvalidArgument(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    Ok(())
}
