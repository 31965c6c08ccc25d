use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ServiceError,
    models::{Order, OrderStatus, PaymentConfirmation, PriceInput},
    services::{orders::OrderService, payments::PaymentGateway},
    webhooks::{EventClass, WebhookEvent, ORDER_ID_METADATA_KEY},
};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePaymentIntentRequest {
    #[serde(alias = "orderId")]
    pub order_id: Uuid,
    /// Major currency units, e.g. `115.00`
    #[schema(value_type = String, example = "115.00")]
    pub amount: PriceInput,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentInitiation {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ConfirmPaymentRequest {
    #[serde(alias = "paymentIntentId")]
    #[validate(length(min = 1, message = "Payment intent id is required"))]
    pub payment_intent_id: String,
    #[serde(alias = "orderId")]
    pub order_id: Uuid,
    #[validate(email)]
    pub payer_email: Option<String>,
}

/// What the webhook endpoint did with an event. Every variant is acknowledged
/// to the gateway with a 2xx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAck {
    /// Payment recorded and order moved to processing
    Applied,
    /// Order was already past pending; redelivery
    AlreadyApplied,
    /// Payment captured for an order that was cancelled; needs a refund by hand
    OrderCancelled,
    /// Event references an order that does not exist
    OrderMissing,
    /// Event type not handled, or no usable order reference
    Ignored,
    /// Failed payment logged; order untouched
    PaymentFailedNoted,
}

/// Coordinates the payment gateway with the order lifecycle.
#[derive(Clone)]
pub struct CheckoutService {
    orders: OrderService,
    gateway: Arc<dyn PaymentGateway>,
    default_currency: String,
    gateway_timeout: Duration,
}

impl CheckoutService {
    pub fn new(orders: OrderService, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            orders,
            gateway,
            default_currency: "usd".to_string(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into().to_lowercase();
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    async fn call_gateway<T, Fut>(
        &self,
        operation: &'static str,
        call: Fut,
        on_timeout: fn(String) -> ServiceError,
    ) -> Result<T, ServiceError>
    where
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = self.gateway_timeout.as_millis() as u64, "payment gateway timed out");
                Err(on_timeout(format!(
                    "{} got no response within {}ms",
                    operation,
                    self.gateway_timeout.as_millis()
                )))
            }
        }
    }

    /// Creates a gateway intent for an existing order. Does not touch the order.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn initiate_payment(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<PaymentInitiation, ServiceError> {
        request.validate()?;
        let amount = request.amount.coerce("amount")?;
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "amount must be greater than zero".to_string(),
            ));
        }
        let amount_minor = to_minor_units(amount)?;
        if amount_minor <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "amount {} is less than the smallest chargeable unit",
                amount
            )));
        }

        self.orders.get_order(request.order_id).await?;

        let currency = request
            .currency
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|| self.default_currency.clone());
        let metadata = HashMap::from([(
            ORDER_ID_METADATA_KEY.to_string(),
            request.order_id.to_string(),
        )]);

        let intent = self
            .call_gateway(
                "create_intent",
                self.gateway.create_intent(amount_minor, &currency, metadata),
                ServiceError::GatewayTimeout,
            )
            .await?;

        info!(intent_id = %intent.id, amount_minor, %currency, "payment intent created");
        Ok(PaymentInitiation {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
            amount_minor,
            currency,
        })
    }

    /// Client-side confirmation path: re-reads the intent from the gateway and
    /// records the payment only if the gateway reports success.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, intent_id = %request.payment_intent_id))]
    pub async fn confirm_payment(
        &self,
        request: ConfirmPaymentRequest,
    ) -> Result<Order, ServiceError> {
        request.validate()?;

        let intent = self
            .call_gateway(
                "retrieve_intent",
                self.gateway.retrieve_intent(&request.payment_intent_id),
                ServiceError::ConfirmationTimeout,
            )
            .await?;

        if let Some(reference) = intent.order_reference() {
            if reference.trim() != request.order_id.to_string() {
                return Err(ServiceError::ValidationError(format!(
                    "Payment intent {} belongs to a different order",
                    intent.id
                )));
            }
        }

        if !intent.status.is_success() {
            info!(status = %intent.status, "payment not completed");
            return Err(ServiceError::PaymentNotCompleted {
                status: intent.status.to_string(),
            });
        }

        let confirmation = PaymentConfirmation {
            transaction_id: intent.id,
            status: intent.status.to_string(),
            payer_email: request.payer_email.or(intent.receipt_email),
        };
        self.orders
            .apply_payment_result(request.order_id, confirmation)
            .await
    }

    /// Verifies and applies a gateway event.
    ///
    /// Redeliveries and events for unknown orders are acknowledged so the
    /// gateway stops retrying; storage failures propagate so it retries.
    #[instrument(skip(self, payload, signature_header, signing_secret), fields(bytes = payload.len()))]
    pub async fn handle_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        signing_secret: &str,
    ) -> Result<WebhookAck, ServiceError> {
        self.gateway
            .verify_webhook_signature(payload, signature_header, signing_secret)
            .map_err(|e| {
                warn!(error = %e, "webhook signature rejected");
                e
            })?;

        let event = WebhookEvent::parse(payload)?;
        let event_id = event.id.as_deref().unwrap_or("-");

        match event.class() {
            EventClass::Other => {
                info!(event_id, event_type = %event.event_type, "ignoring webhook event");
                Ok(WebhookAck::Ignored)
            }
            EventClass::PaymentFailed => {
                warn!(
                    event_id,
                    event_type = %event.event_type,
                    order_ref = event.raw_order_id().unwrap_or("-"),
                    "payment failed"
                );
                Ok(WebhookAck::PaymentFailedNoted)
            }
            EventClass::PaymentSucceeded => self.apply_succeeded_event(&event).await,
        }
    }

    async fn apply_succeeded_event(&self, event: &WebhookEvent) -> Result<WebhookAck, ServiceError> {
        let event_id = event.id.as_deref().unwrap_or("-");

        let Some(order_id) = event.order_id() else {
            warn!(event_id, order_ref = event.raw_order_id().unwrap_or("-"), "webhook without usable order reference");
            return Ok(WebhookAck::Ignored);
        };
        let Some(transaction_id) = event.object_id().or(event.id.as_deref()) else {
            warn!(event_id, %order_id, "webhook without transaction id");
            return Ok(WebhookAck::Ignored);
        };

        let confirmation = PaymentConfirmation {
            transaction_id: transaction_id.to_string(),
            status: event.object_status().unwrap_or("succeeded").to_string(),
            payer_email: event.receipt_email().map(str::to_string),
        };

        match self.orders.apply_payment_result(order_id, confirmation).await {
            Ok(_) => Ok(WebhookAck::Applied),
            Err(ServiceError::InvalidTransition {
                from: OrderStatus::Cancelled,
                ..
            }) => {
                warn!(event_id, %order_id, transaction_id, "payment succeeded for a cancelled order");
                Ok(WebhookAck::OrderCancelled)
            }
            Err(ServiceError::InvalidTransition { from, .. }) => {
                info!(event_id, %order_id, status = %from, "payment already applied");
                Ok(WebhookAck::AlreadyApplied)
            }
            Err(ServiceError::NotFound(_)) => {
                warn!(event_id, %order_id, "webhook for unknown order");
                Ok(WebhookAck::OrderMissing)
            }
            Err(e) => Err(e),
        }
    }
}

/// Converts a major-unit amount to minor units, rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|minor| {
            minor.round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        })
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| ServiceError::ValidationError(format!("amount {} is too large", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case(dec!(115), 11500)]
    #[test_case(dec!(19.99), 1999)]
    #[test_case(dec!(0.005), 1)]
    #[test_case(dec!(10.004), 1000)]
    fn converts_to_minor_units(amount: Decimal, expected: i64) {
        assert_eq!(to_minor_units(amount).unwrap(), expected);
    }

    #[test_case(Decimal::MAX)]
    #[test_case(dec!(100000000000000000))]
    fn oversized_amounts_are_validation_errors(amount: Decimal) {
        assert!(matches!(
            to_minor_units(amount),
            Err(ServiceError::ValidationError(msg)) if msg.contains("too large")
        ));
    }

    #[test]
    fn webhook_ack_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&WebhookAck::AlreadyApplied).unwrap(),
            "\"already_applied\""
        );
    }
}
