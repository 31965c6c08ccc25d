use axum::{extract::State, http::HeaderMap, response::Json};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    errors::ServiceError, services::checkout::WebhookAck, webhooks::SIGNATURE_HEADER, AppState,
};

/// Acknowledgement returned to the payment gateway
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookReceipt {
    pub received: bool,
    pub outcome: WebhookAck,
}

// POST /api/v1/checkout/webhook
#[utoipa::path(
    post,
    path = "/api/v1/checkout/webhook",
    request_body(content = String, description = "Raw event JSON exactly as signed by the gateway", content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "t=<unix ts>,v1=<hex hmac-sha256>")),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookReceipt),
        (status = 400, description = "Missing or invalid signature, or malformed event", body = crate::errors::ErrorResponse),
        (status = 500, description = "Event could not be applied; the gateway should retry", body = crate::errors::ErrorResponse),
        (status = 503, description = "Webhook signing secret not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookReceipt>, ServiceError> {
    let Some(secret) = state.config.webhook_secret() else {
        warn!("payment webhook received but no signing secret is configured");
        return Err(ServiceError::ServiceUnavailable(
            "payment webhooks are not configured".to_string(),
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServiceError::SignatureVerification(format!("missing {} header", SIGNATURE_HEADER))
        })?;

    let outcome = state
        .services
        .checkout
        .handle_webhook_event(&body, signature, secret)
        .await?;

    info!(?outcome, "payment webhook processed");
    Ok(Json(WebhookReceipt {
        received: true,
        outcome,
    }))
}
