use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};

use crate::{
    errors::ServiceError,
    models::Order,
    services::checkout::{ConfirmPaymentRequest, CreatePaymentIntentRequest, PaymentInitiation},
    ApiResponse, AppState,
};

/// Build the checkout Router scoped under `/api/v1/checkout`.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/confirm-payment", post(confirm_payment))
        .route("/webhook", post(super::payment_webhooks::payment_webhook))
}

/// Start a gateway payment for an existing order
#[utoipa::path(
    post,
    path = "/api/v1/checkout/create-payment-intent",
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 201, description = "Payment intent created", body = ApiResponse<PaymentInitiation>),
        (status = 400, description = "Invalid amount or currency", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway rejected the request", body = crate::errors::ErrorResponse),
        (status = 504, description = "Gateway did not answer in time; safe to retry", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentIntentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentInitiation>>), ServiceError> {
    let initiation = state.services.checkout.initiate_payment(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(initiation))))
}

/// Confirm a client-side payment by re-reading the intent from the gateway
#[utoipa::path(
    post,
    path = "/api/v1/checkout/confirm-payment",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<Order>),
        (status = 402, description = "Gateway reports the payment as not completed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or intent not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is not pending", body = crate::errors::ErrorResponse),
        (status = 504, description = "Payment status unknown; query again before retrying", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state.services.checkout.confirm_payment(payload).await?;
    Ok(Json(ApiResponse::success(order)))
}
