use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{Order, OrderStatus, UserSummary},
    repositories::{DirectoryStore, OrderFilter, OrderStore},
};

pub const RECENT_ORDERS_LIMIT: u64 = 5;
pub const TOP_PRODUCTS_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecentOrder {
    pub id: Uuid,
    /// Absent when the purchaser no longer exists
    pub user: Option<UserSummary>,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub quantity_sold: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub user_count: u64,
    pub product_count: u64,
    pub order_count: u64,
    /// Sum of `total_price` over paid orders that were not cancelled
    pub revenue: Decimal,
    pub recent_orders: Vec<RecentOrder>,
    /// Every status is present, zero when unused
    pub orders_by_status: BTreeMap<String, u64>,
    pub top_products: Vec<TopProduct>,
    pub generated_at: DateTime<Utc>,
}

/// Read-only reporting over orders, users and products
#[derive(Clone)]
pub struct DashboardService {
    orders: Arc<dyn OrderStore>,
    directory: Arc<dyn DirectoryStore>,
}

fn aggregation_error(source: &'static str) -> impl Fn(ServiceError) -> ServiceError {
    move |e| {
        error!(source, error = %e, "dashboard query failed");
        ServiceError::AggregationError(format!("{} query failed: {}", source, e))
    }
}

impl DashboardService {
    pub fn new(orders: Arc<dyn OrderStore>, directory: Arc<dyn DirectoryStore>) -> Self {
        Self { orders, directory }
    }

    /// All-or-nothing: any failing query fails the whole snapshot.
    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<DashboardStats, ServiceError> {
        let default_filter = OrderFilter::default();
        let (user_count, product_count, order_count, (recent, _), all_orders) = tokio::try_join!(
            async { self.directory.count_users().await.map_err(aggregation_error("users")) },
            async {
                self.directory
                    .count_products()
                    .await
                    .map_err(aggregation_error("products"))
            },
            async {
                self.orders
                    .count(&default_filter)
                    .await
                    .map_err(aggregation_error("order count"))
            },
            async {
                self.orders
                    .find_all(&default_filter, 1, RECENT_ORDERS_LIMIT)
                    .await
                    .map_err(aggregation_error("recent orders"))
            },
            async { self.orders.all().await.map_err(aggregation_error("orders")) },
        )?;

        let recent_orders = self.resolve_purchasers(recent).await?;

        let stats = DashboardStats {
            user_count,
            product_count,
            order_count,
            revenue: revenue(&all_orders)?,
            recent_orders,
            orders_by_status: orders_by_status(&all_orders),
            top_products: top_products(&all_orders, TOP_PRODUCTS_LIMIT),
            generated_at: Utc::now(),
        };
        info!(orders = stats.order_count, revenue = %stats.revenue, "dashboard stats computed");
        Ok(stats)
    }

    async fn resolve_purchasers(&self, recent: Vec<Order>) -> Result<Vec<RecentOrder>, ServiceError> {
        let mut ids: Vec<Uuid> = recent.iter().map(|o| o.user_id).collect();
        ids.sort();
        ids.dedup();

        let users: HashMap<Uuid, UserSummary> = self
            .directory
            .find_users(&ids)
            .await
            .map_err(aggregation_error("purchasers"))?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(recent
            .into_iter()
            .map(|order| RecentOrder {
                id: order.id,
                user: users.get(&order.user_id).cloned(),
                total_price: order.total_price,
                status: order.status,
                created_at: order.created_at,
            })
            .collect())
    }
}

pub fn revenue(orders: &[Order]) -> Result<Decimal, ServiceError> {
    orders
        .iter()
        .filter(|o| o.status.counts_toward_revenue())
        .try_fold(Decimal::ZERO, |acc, o| acc.checked_add(o.total_price))
        .ok_or_else(|| {
            error!("revenue total overflowed");
            ServiceError::AggregationError("revenue total overflowed".to_string())
        })
}

pub fn orders_by_status(orders: &[Order]) -> BTreeMap<String, u64> {
    let mut counts: BTreeMap<String, u64> = OrderStatus::iter()
        .map(|status| (status.to_string(), 0))
        .collect();
    for order in orders {
        *counts.entry(order.status.to_string()).or_default() += 1;
    }
    counts
}

/// Ranks products by units sold. `orders` must be in creation order: ties keep
/// the product first encountered, and the name comes from that first line item.
pub fn top_products(orders: &[Order], limit: usize) -> Vec<TopProduct> {
    let mut ranked: Vec<TopProduct> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for item in orders.iter().flat_map(|o| o.items.iter()) {
        let Some(product_id) = item.product_id else {
            continue;
        };
        match index.get(&product_id) {
            Some(&i) => ranked[i].quantity_sold += u64::from(item.quantity),
            None => {
                index.insert(product_id, ranked.len());
                ranked.push(TopProduct {
                    product_id,
                    name: item.name.clone(),
                    quantity_sold: u64::from(item.quantity),
                });
            }
        }
    }

    // stable
    ranked.sort_by(|a, b| b.quantity_sold.cmp(&a.quantity_sold));
    ranked.truncate(limit);
    ranked
}
