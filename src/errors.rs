use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::order::OrderStatus;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Not found: Order 550e8400-e29b-41d4-a716-446655440000 not found",
    "details": "not_found",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Stable machine-readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error was produced
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Payment not completed: gateway reports status '{status}'")]
    PaymentNotCompleted { status: String },

    #[error("Webhook signature verification failed: {0}")]
    SignatureVerification(String),

    #[error("Aggregation error: {0}")]
    AggregationError(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Payment gateway timed out: {0}")]
    GatewayTimeout(String),

    #[error("Payment confirmation timed out: {0}")]
    ConfirmationTimeout(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn order_not_found(order_id: Uuid) -> Self {
        ServiceError::NotFound(format!("Order {} not found", order_id))
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::SignatureVerification(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. } | Self::ConcurrentModification(_) => {
                StatusCode::CONFLICT
            }
            Self::PaymentNotCompleted { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::GatewayTimeout(_) | Self::ConfirmationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_)
            | Self::AggregationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code surfaced in `ErrorResponse::details`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::PaymentNotCompleted { .. } => "payment_not_completed",
            Self::SignatureVerification(_) => "signature_verification_failed",
            Self::AggregationError(_) => "aggregation_error",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::GatewayTimeout(_) => "payment_gateway_timeout",
            Self::ConfirmationTimeout(_) => "payment_confirmation_timeout",
            Self::ExternalServiceError(_) => "external_service_error",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Whether the same request may be repeated unchanged.
    ///
    /// `ConfirmationTimeout` is deliberately not retryable as-is: the payment
    /// may have gone through, so callers re-query the intent instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_)
                | Self::AggregationError(_)
                | Self::ConcurrentModification(_)
                | Self::GatewayTimeout(_)
                | Self::ServiceUnavailable(_)
        )
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::AggregationError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::SignatureVerification(_) => "Invalid webhook signature".to_string(),
            Self::ExternalServiceError(_) => "Payment gateway error".to_string(),
            Self::GatewayTimeout(_) => {
                "Payment gateway timed out; no changes were made, the request can be retried"
                    .to_string()
            }
            Self::ConfirmationTimeout(_) => {
                "Payment confirmation timed out; the payment status is unknown, query it again before retrying"
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: Some(self.code().to_string()),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
