use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Orders API",
        version = "0.1.0",
        description = r#"
# Storefront Orders API

Order lifecycle, checkout and reporting for a storefront backend.

## Order lifecycle

`pending -> processing -> shipped -> delivered`, with `cancelled` reachable
from `pending` and `processing`. A successful payment moves a pending order to
processing. Disallowed transitions answer `409 Conflict`.

## Payments

`create-payment-intent` starts a gateway payment, `confirm-payment` re-reads the
intent and records it when the gateway reports success. Gateway events arrive
on the webhook endpoint and are verified against the `Stripe-Signature` header.

## Error Handling

Failures share one body shape:

```json
{
  "error": "Conflict",
  "message": "Invalid status transition from delivered to shipped",
  "details": "invalid_transition",
  "request_id": "req-abc123",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Every response carries an `x-request-id` header; send one to correlate logs.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order placement and lifecycle endpoints"),
        (name = "Checkout", description = "Payment intents, confirmation and gateway webhooks"),
        (name = "Dashboard", description = "Store-wide reporting"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::list_user_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::pay_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::delete_order,

        // Checkout
        crate::handlers::checkout::create_payment_intent,
        crate::handlers::checkout::confirm_payment,
        crate::handlers::payment_webhooks::payment_webhook,

        // Dashboard
        crate::handlers::dashboard::get_dashboard_stats,
    ),
    components(
        schemas(
            crate::models::Order,
            crate::models::OrderItem,
            crate::models::OrderStatus,
            crate::models::PaymentResult,
            crate::models::ShippingAddress,
            crate::models::NewOrder,
            crate::models::NewOrderItem,
            crate::models::PaymentConfirmation,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::services::orders::OrderPage,
            crate::handlers::orders::DeletedOrder,

            crate::services::checkout::CreatePaymentIntentRequest,
            crate::services::checkout::PaymentInitiation,
            crate::services::checkout::ConfirmPaymentRequest,
            crate::services::checkout::WebhookAck,
            crate::handlers::payment_webhooks::WebhookReceipt,

            crate::services::analytics::DashboardStats,
            crate::services::analytics::RecentOrder,
            crate::services::analytics::TopProduct,
            crate::models::UserSummary,

            crate::ResponseMeta,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
