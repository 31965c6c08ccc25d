#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use storefront_orders::{
    build_router,
    config::AppConfig,
    handlers::AppServices,
    repositories::{InMemoryDirectory, InMemoryOrderStore},
    services::payments::{MockPaymentGateway, PaymentGateway},
    webhooks::{SignatureGenerator, SIGNATURE_HEADER},
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Helper harness for an application backed by in-memory stores and the mock gateway.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub orders: Arc<InMemoryOrderStore>,
    pub directory: Arc<InMemoryDirectory>,
}

pub struct TestAppBuilder {
    config: AppConfig,
    gateway: Arc<dyn PaymentGateway>,
}

impl TestAppBuilder {
    pub fn gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn without_webhook_secret(mut self) -> Self {
        self.config.payment_webhook_secret = None;
        self
    }

    pub fn build(self) -> TestApp {
        let orders = Arc::new(InMemoryOrderStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let services = AppServices::new(
            orders.clone(),
            directory.clone(),
            self.gateway,
            &self.config,
        );
        let state = AppState {
            db: None,
            config: Arc::new(self.config),
            services,
        };

        TestApp {
            router: build_router(state.clone()),
            state,
            orders,
            directory,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        let mut config = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        config.payment_webhook_secret = Some(WEBHOOK_SECRET.to_string());

        TestAppBuilder {
            config,
            gateway: Arc::new(MockPaymentGateway::new()),
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Send a JSON request against the router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Posts `payload` to the webhook endpoint exactly as given, signed now.
    pub async fn deliver_webhook(&self, payload: &Value) -> Response {
        let raw = serde_json::to_vec(payload).expect("serialize webhook payload");
        let header = SignatureGenerator::new(WEBHOOK_SECRET)
            .header_value(Utc::now().timestamp(), &raw)
            .expect("sign webhook payload");
        self.deliver_raw_webhook(raw, Some(&header)).await
    }

    pub async fn deliver_raw_webhook(&self, raw: Vec<u8>, signature: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/checkout/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        let request = builder.body(Body::from(raw)).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Places an order over HTTP and returns its id.
    pub async fn place_order(&self, user_id: Uuid) -> Uuid {
        let response = self
            .request(Method::POST, "/api/v1/orders", Some(order_payload(user_id)))
            .await;
        assert_eq!(response.status(), 201);
        let body = response_json(response).await;
        body["data"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("created order id")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Cart snapshot totalling 115.00.
pub fn order_payload(user_id: Uuid) -> Value {
    json!({
        "user_id": user_id,
        "order_items": [
            {
                "product": Uuid::new_v4(),
                "name": "Court Classic",
                "quantity": 2,
                "price": "50.00",
                "size": "42",
                "image": "/img/court-classic.png"
            }
        ],
        "shipping_address": {
            "full_name": "Grace Hopper",
            "street": "1 Navy Way",
            "city": "Arlington",
            "postal_code": "22202",
            "country": "US"
        },
        "payment_method": "card",
        "items_price": 100,
        "tax_price": "10.00",
        "shipping_price": 5,
        "total_price": "115.00"
    })
}

pub fn payment_succeeded_event(order_id: &str, intent_id: &str) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": intent_id,
                "object": "payment_intent",
                "status": "succeeded",
                "amount": 11500,
                "currency": "usd",
                "receipt_email": "grace@example.com",
                "metadata": { "orderId": order_id }
            }
        }
    })
}
