use crate::{
    errors::ServiceError,
    models::{NewOrder, Order, OrderStatus, PaymentConfirmation},
    repositories::{OrderFilter, OrderStore},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Read-validate-write attempts before a concurrent-modification error surfaces.
const MAX_WRITE_ATTEMPTS: u32 = 3;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 64, message = "Tracking number is too long"))]
    pub tracking_number: Option<String>,
}

/// One page of an order listing, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub total: u64,
    pub page: u64,
    pub pages: u64,
    pub page_size: u64,
}

/// Owner of the order state machine.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    default_page_size: u64,
    max_page_size: u64,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_page_limits(mut self, default_page_size: u64, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id, items = request.items.len()))]
    pub async fn create_order(&self, request: NewOrder) -> Result<Order, ServiceError> {
        let order = request.into_order(Utc::now())?;
        let order = self.store.create(&order).await?;
        info!(order_id = %order.id, total = %order.total_price, "order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.store
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(order_id))
    }

    #[instrument(skip(self))]
    pub async fn list_user_orders(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        self.store.find_by_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: Option<u64>,
        page_size: Option<u64>,
    ) -> Result<OrderPage, ServiceError> {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);

        let (items, total) = self.store.find_all(&filter, page, page_size).await?;
        Ok(OrderPage {
            items,
            total,
            page,
            pages: total.div_ceil(page_size),
            page_size,
        })
    }

    /// Moves an order to `target`, retrying on concurrent writes so the
    /// transition is always validated against the latest stored status.
    #[instrument(skip(self), fields(order_id = %order_id, target = %target))]
    pub async fn transition(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<Order, ServiceError> {
        let order = self
            .mutate(order_id, |order, now| {
                order.transition_to(target, tracking_number, now)
            })
            .await?;
        info!(status = %order.status, "order status updated");
        Ok(order)
    }

    #[instrument(skip(self, confirmation), fields(order_id = %order_id, transaction_id = %confirmation.transaction_id))]
    pub async fn apply_payment_result(
        &self,
        order_id: Uuid,
        confirmation: PaymentConfirmation,
    ) -> Result<Order, ServiceError> {
        confirmation.validate()?;
        let order = self
            .mutate(order_id, |order, now| order.record_payment(&confirmation, now))
            .await?;
        info!("payment recorded");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete(order_id).await? {
            return Err(ServiceError::order_not_found(order_id));
        }
        warn!("order deleted");
        Ok(())
    }

    async fn mutate<F>(&self, order_id: Uuid, mut apply: F) -> Result<Order, ServiceError>
    where
        F: FnMut(&mut Order, DateTime<Utc>) -> Result<(), ServiceError> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut order = self.get_order(order_id).await?;
            apply(&mut order, Utc::now())?;

            match self.store.update(&order).await {
                Ok(saved) => return Ok(saved),
                Err(ServiceError::ConcurrentModification(_)) if attempt < MAX_WRITE_ATTEMPTS => {
                    debug!(attempt, "order changed underneath us, re-reading");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewOrderItem, PriceInput, ShippingAddress};
    use crate::repositories::InMemoryOrderStore;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn draft() -> NewOrder {
        NewOrder {
            user_id: Uuid::new_v4(),
            items: vec![NewOrderItem {
                product_id: Some(Uuid::new_v4()),
                name: "Trail Blazer".into(),
                quantity: 1,
                unit_price: PriceInput::from(90u32),
                size: "43".into(),
                image: String::new(),
            }],
            shipping_address: ShippingAddress {
                full_name: "Alan Turing".into(),
                street: "Bletchley Park".into(),
                city: "Milton Keynes".into(),
                postal_code: "MK3 6EB".into(),
                country: "UK".into(),
            },
            payment_method: "card".into(),
            items_price: PriceInput::from(90u32),
            tax_price: PriceInput::from(9u32),
            shipping_price: PriceInput::from(1u32),
            total_price: PriceInput::from(100u32),
        }
    }

    /// Store whose first `conflicts` updates lose the race.
    struct RacyStore {
        inner: InMemoryOrderStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl OrderStore for RacyStore {
        async fn create(&self, order: &Order) -> Result<Order, ServiceError> {
            self.inner.create(order).await
        }
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, ServiceError> {
            self.inner.find_by_id(id).await
        }
        async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError> {
            self.inner.find_by_user(user_id).await
        }
        async fn find_all(
            &self,
            filter: &OrderFilter,
            page: u64,
            page_size: u64,
        ) -> Result<(Vec<Order>, u64), ServiceError> {
            self.inner.find_all(filter, page, page_size).await
        }
        async fn count(&self, filter: &OrderFilter) -> Result<u64, ServiceError> {
            self.inner.count(filter).await
        }
        async fn all(&self) -> Result<Vec<Order>, ServiceError> {
            self.inner.all().await
        }
        async fn update(&self, order: &Order) -> Result<Order, ServiceError> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(ServiceError::ConcurrentModification(order.id));
            }
            self.inner.update(order).await
        }
        async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
            self.inner.delete(id).await
        }
    }

    fn racy(conflicts: u32) -> OrderService {
        OrderService::new(Arc::new(RacyStore {
            inner: InMemoryOrderStore::new(),
            conflicts: AtomicU32::new(conflicts),
        }))
    }

    #[tokio::test]
    async fn retries_after_a_lost_race() {
        let service = racy(2);
        let order = service.create_order(draft()).await.unwrap();
        let updated = service
            .transition(order.id, OrderStatus::Cancelled, None)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Cancelled);
        assert_eq!(updated.version, order.version + 1);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let service = racy(MAX_WRITE_ATTEMPTS);
        let order = service.create_order(draft()).await.unwrap();
        assert_matches!(
            service.transition(order.id, OrderStatus::Cancelled, None).await,
            Err(ServiceError::ConcurrentModification(_))
        );
    }

    #[tokio::test]
    async fn listing_clamps_page_size_and_counts_pages() {
        let service =
            OrderService::new(Arc::new(InMemoryOrderStore::new())).with_page_limits(2, 3);
        for _ in 0..5 {
            service.create_order(draft()).await.unwrap();
        }

        let first = service
            .list_orders(OrderFilter::default(), None, None)
            .await
            .unwrap();
        assert_eq!((first.page, first.page_size, first.pages), (1, 2, 3));
        assert_eq!(first.items.len(), 2);

        let clamped = service
            .list_orders(OrderFilter::default(), Some(2), Some(500))
            .await
            .unwrap();
        assert_eq!(clamped.page_size, 3);
        assert_eq!(clamped.items.len(), 2);
        assert_eq!(clamped.total, 5);

        let pending = service
            .list_orders(
                OrderFilter::with_status(OrderStatus::Shipped),
                Some(0),
                Some(0),
            )
            .await
            .unwrap();
        assert_eq!((pending.page, pending.page_size, pending.total), (1, 1, 0));
    }

    #[tokio::test]
    async fn payment_confirmation_requires_transaction_id() {
        let service = OrderService::new(Arc::new(InMemoryOrderStore::new()));
        let order = service.create_order(draft()).await.unwrap();
        let confirmation = PaymentConfirmation {
            transaction_id: String::new(),
            status: "succeeded".into(),
            payer_email: None,
        };
        assert_matches!(
            service.apply_payment_result(order.id, confirmation).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(
            service.get_order(order.id).await.unwrap().status,
            OrderStatus::Pending
        );
    }
}
