use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{NewOrder, Order, OrderStatus, PaymentConfirmation},
    repositories::OrderFilter,
    services::orders::{OrderPage, UpdateOrderStatusRequest},
    ApiResponse, AppState,
};

/// Build the orders Router scoped under `/api/v1/orders`.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/user/:user_id", get(list_user_orders))
        .route("/:id", get(get_order).delete(delete_order))
        .route("/:id/pay", put(pay_order))
        .route("/:id/status", put(update_order_status))
}

/// Query parameters for order listing
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OrderListQuery {
    /// Only return orders in this status
    pub status: Option<String>,
    /// 1-based page number (default: 1)
    #[param(minimum = 1)]
    pub page: Option<u64>,
    /// Page size, capped by configuration
    #[param(minimum = 1)]
    pub limit: Option<u64>,
}

impl OrderListQuery {
    fn filter(&self) -> Result<OrderFilter, ServiceError> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(OrderFilter::default()),
            Some(raw) => OrderStatus::from_str(raw)
                .map(OrderFilter::with_status)
                .map_err(|_| ServiceError::ValidationError(format!("Unknown order status '{}'", raw))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedOrder {
    pub id: Uuid,
    pub deleted: bool,
}

/// Place a new order from a cart snapshot
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = NewOrder,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<Order>),
        (status = 400, description = "Invalid order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<NewOrder>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ServiceError> {
    let order = state.services.orders.create_order(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// List orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<OrderPage>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<OrderPage>>, ServiceError> {
    let filter = query.filter()?;
    let page = state
        .services
        .orders
        .list_orders(filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

/// All orders placed by one user, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Purchaser id")),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<Vec<Order>>)
    ),
    tag = "Orders"
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Order>>>, ServiceError> {
    let orders = state.services.orders.list_user_orders(user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<Order>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Record a payment result and move the order to processing
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/pay",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = PaymentConfirmation,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<Order>),
        (status = 400, description = "Incomplete payment details", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is not pending", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn pay_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentConfirmation>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state.services.orders.apply_payment_result(id, payload).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    validator::Validate::validate(&payload)?;
    let order = state
        .services
        .orders
        .transition(id, payload.status, payload.tracking_number.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order deleted", body = ApiResponse<DeletedOrder>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeletedOrder>>, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(Json(ApiResponse::success(DeletedOrder { id, deleted: true })))
}
