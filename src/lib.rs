//! Storefront Orders Library
//!
//! Order lifecycle, checkout coordination and dashboard reporting behind an
//! axum HTTP API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;
pub mod webhooks;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

/// Upper bound on a single request, gateway round-trips included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    /// Absent when the stores are in-memory.
    pub db: Option<Arc<DatabaseConnection>>,
    pub config: Arc<config::AppConfig>,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/orders", handlers::orders::order_routes())
        // Payment intents, confirmation and the signature-verified gateway webhook
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/dashboard", handlers::dashboard::dashboard_routes())
}

/// Full application router: API, Swagger UI and the cross-cutting layers.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::<AppState>::new()
        .route("/", get(|| async { "storefront-orders up" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(crate::tracing::request_id_middleware))
        .with_state(state)
}

/// Explicit origins win; otherwise permissive in development or when opted in.
/// Anything else only serves same-origin callers.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    }
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "storefront-orders",
        "environment": state.config.environment,
        "payment_provider": state.config.payment_provider,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match &state.db {
        Some(db) => match db.ping().await {
            Ok(_) => "healthy",
            Err(e) => {
                ::tracing::warn!(error = %e, "database ping failed");
                "unhealthy"
            }
        },
        None => "in_memory",
    };

    let health_data = json!({
        "status": if db_status == "unhealthy" { "unhealthy" } else { "healthy" },
        "checks": {
            "database": db_status,
            "payment_webhooks": if state.config.webhook_secret().is_some() { "configured" } else { "disabled" },
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
