//! Dashboard aggregation over in-memory stores and through the HTTP route.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use axum::http::Method;
use common::{response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_orders::{
    errors::ServiceError,
    models::{
        NewOrder, NewOrderItem, OrderStatus, PaymentConfirmation, PriceInput, ProductSummary,
        ShippingAddress, UserSummary,
    },
    repositories::{DirectoryStore, InMemoryDirectory, InMemoryOrderStore},
    services::{analytics::DashboardService, orders::OrderService},
};
use uuid::Uuid;

fn draft(user_id: Uuid, lines: &[(Uuid, &str, i64)], unit_price: u32) -> NewOrder {
    let items_total: u32 = lines.iter().map(|(_, _, q)| *q as u32 * unit_price).sum();
    NewOrder {
        user_id,
        items: lines
            .iter()
            .map(|(product_id, name, quantity)| NewOrderItem {
                product_id: Some(*product_id),
                name: name.to_string(),
                quantity: *quantity,
                unit_price: PriceInput::from(unit_price),
                size: "M".into(),
                image: String::new(),
            })
            .collect(),
        shipping_address: ShippingAddress {
            full_name: "Katherine Johnson".into(),
            street: "1 Langley Blvd".into(),
            city: "Hampton".into(),
            postal_code: "23681".into(),
            country: "US".into(),
        },
        payment_method: "card".into(),
        items_price: PriceInput::from(items_total),
        tax_price: PriceInput::from(0u32),
        shipping_price: PriceInput::from(0u32),
        total_price: PriceInput::from(items_total),
    }
}

fn paid() -> PaymentConfirmation {
    PaymentConfirmation {
        transaction_id: format!("pi_{}", Uuid::new_v4().simple()),
        status: "succeeded".into(),
        payer_email: None,
    }
}

#[tokio::test]
async fn empty_store_reports_zeroes() {
    let dashboard = DashboardService::new(
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryDirectory::new()),
    );

    let stats = dashboard.get_stats().await.unwrap();
    assert_eq!(stats.user_count, 0);
    assert_eq!(stats.product_count, 0);
    assert_eq!(stats.order_count, 0);
    assert_eq!(stats.revenue, dec!(0));
    assert!(stats.recent_orders.is_empty());
    assert!(stats.top_products.is_empty());
    assert_eq!(stats.orders_by_status.len(), 5);
    assert!(stats.orders_by_status.values().all(|&n| n == 0));
}

#[tokio::test]
async fn stats_reflect_orders_users_and_products() {
    let store = Arc::new(InMemoryOrderStore::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let orders = OrderService::new(store.clone());
    let dashboard = DashboardService::new(store, directory.clone());

    let ada: UserSummary = directory.add_user("Ada", "ada@example.com");
    let alan = directory.add_user("Alan", "alan@example.com");
    let boots: ProductSummary = directory.add_product("Hiking Boots");
    let socks = directory.add_product("Wool Socks");
    let laces = directory.add_product("Laces");

    // 40 pending, never paid
    orders
        .create_order(draft(ada.id, &[(boots.id, "Hiking Boots", 1)], 40))
        .await
        .unwrap();
    // 30 paid, then delivered
    let delivered = orders
        .create_order(draft(ada.id, &[(socks.id, "Wool Socks", 3)], 10))
        .await
        .unwrap();
    orders.apply_payment_result(delivered.id, paid()).await.unwrap();
    orders.transition(delivered.id, OrderStatus::Shipped, Some("TRK1")).await.unwrap();
    orders.transition(delivered.id, OrderStatus::Delivered, None).await.unwrap();
    // 25 paid then cancelled: excluded from revenue
    let cancelled = orders
        .create_order(draft(alan.id, &[(laces.id, "Laces", 5)], 5))
        .await
        .unwrap();
    orders.apply_payment_result(cancelled.id, paid()).await.unwrap();
    orders.transition(cancelled.id, OrderStatus::Cancelled, None).await.unwrap();
    // 20 paid, processing; purchaser no longer exists
    let orphan = orders
        .create_order(draft(Uuid::new_v4(), &[(boots.id, "Hiking Boots", 1)], 20))
        .await
        .unwrap();
    orders.apply_payment_result(orphan.id, paid()).await.unwrap();

    let stats = dashboard.get_stats().await.unwrap();
    assert_eq!(stats.user_count, 2);
    assert_eq!(stats.product_count, 3);
    assert_eq!(stats.order_count, 4);
    assert_eq!(stats.revenue, dec!(50));

    assert_eq!(stats.orders_by_status["pending"], 1);
    assert_eq!(stats.orders_by_status["processing"], 1);
    assert_eq!(stats.orders_by_status["delivered"], 1);
    assert_eq!(stats.orders_by_status["cancelled"], 1);
    assert_eq!(stats.orders_by_status["shipped"], 0);
    assert_eq!(stats.orders_by_status.values().sum::<u64>(), stats.order_count);

    let recent_ids: Vec<Uuid> = stats.recent_orders.iter().map(|o| o.id).collect();
    assert_eq!(recent_ids.len(), 4);
    assert_eq!(recent_ids[0], orphan.id);
    assert!(stats.recent_orders[0].user.is_none());
    let ada_order = stats
        .recent_orders
        .iter()
        .find(|o| o.id == delivered.id)
        .unwrap();
    assert_eq!(ada_order.user.as_ref().map(|u| u.email.as_str()), Some("ada@example.com"));

    let top: Vec<(&str, u64)> = stats
        .top_products
        .iter()
        .map(|p| (p.name.as_str(), p.quantity_sold))
        .collect();
    assert_eq!(top, vec![("Laces", 5), ("Wool Socks", 3), ("Hiking Boots", 2)]);
}

#[tokio::test]
async fn recent_orders_are_capped_at_five() {
    let store = Arc::new(InMemoryOrderStore::new());
    let orders = OrderService::new(store.clone());
    let dashboard = DashboardService::new(store, Arc::new(InMemoryDirectory::new()));
    let product = Uuid::new_v4();

    let mut placed = Vec::new();
    for _ in 0..7 {
        let order = orders
            .create_order(draft(Uuid::new_v4(), &[(product, "Cap", 1)], 12))
            .await
            .unwrap();
        placed.push(order.id);
    }

    let stats = dashboard.get_stats().await.unwrap();
    assert_eq!(stats.order_count, 7);
    let recent: Vec<Uuid> = stats.recent_orders.iter().map(|o| o.id).collect();
    let expected: Vec<Uuid> = placed.iter().rev().take(5).copied().collect();
    assert_eq!(recent, expected);
    assert_eq!(stats.top_products[0].quantity_sold, 7);
}

fn draft_priced(total: Decimal) -> NewOrder {
    let mut order = draft(Uuid::new_v4(), &[(Uuid::new_v4(), "Gold Boots", 1)], 0);
    order.items[0].unit_price = PriceInput::from(total);
    order.items_price = PriceInput::from(total);
    order.total_price = PriceInput::from(total);
    order
}

#[tokio::test]
async fn revenue_overflow_is_an_aggregation_error() {
    let store = Arc::new(InMemoryOrderStore::new());
    let orders = OrderService::new(store.clone());
    let dashboard = DashboardService::new(store, Arc::new(InMemoryDirectory::new()));

    for _ in 0..2 {
        let order = orders.create_order(draft_priced(Decimal::MAX)).await.unwrap();
        orders.apply_payment_result(order.id, paid()).await.unwrap();
    }

    assert_matches!(
        dashboard.get_stats().await,
        Err(ServiceError::AggregationError(msg)) if msg.contains("revenue")
    );
}

struct BrokenDirectory;

#[async_trait]
impl DirectoryStore for BrokenDirectory {
    async fn count_users(&self) -> Result<u64, ServiceError> {
        Err(ServiceError::InternalError("users table unreachable".into()))
    }

    async fn count_products(&self) -> Result<u64, ServiceError> {
        Ok(0)
    }

    async fn find_users(&self, _ids: &[Uuid]) -> Result<Vec<UserSummary>, ServiceError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn any_failing_query_fails_the_whole_snapshot() {
    let dashboard = DashboardService::new(Arc::new(InMemoryOrderStore::new()), Arc::new(BrokenDirectory));

    let err = dashboard.get_stats().await.unwrap_err();
    assert_matches!(err, ServiceError::AggregationError(ref msg) if msg.contains("users"));
    assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn stats_route_serves_the_snapshot() {
    let app = TestApp::new();
    app.directory.add_user("Grace", "grace@example.com");
    app.place_order(Uuid::new_v4()).await;

    let response = app.request(Method::GET, "/api/v1/dashboard/stats", None).await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user_count"], 1);
    assert_eq!(body["data"]["order_count"], 1);
    assert_eq!(body["data"]["revenue"], "0");
    assert_eq!(body["data"]["orders_by_status"]["pending"], 1);
    assert_eq!(body["data"]["top_products"][0]["name"], "Court Classic");
    assert_eq!(body["data"]["top_products"][0]["quantity_sold"], 2);
}
