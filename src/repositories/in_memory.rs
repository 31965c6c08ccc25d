use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use super::{DirectoryStore, OrderFilter, OrderStore};
use crate::errors::ServiceError;
use crate::models::{Order, ProductSummary, UserSummary};

#[derive(Debug, Clone)]
struct StoredOrder {
    seq: u64,
    order: Order,
}

/// Process-local order store.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<Uuid, StoredOrder>,
    next_seq: AtomicU64,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot ordered by insertion sequence.
    fn sorted(&self, filter: &OrderFilter) -> Vec<StoredOrder> {
        let mut rows: Vec<StoredOrder> = self
            .orders
            .iter()
            .filter(|entry| filter.matches(&entry.value().order))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|row| row.seq);
        rows
    }

    fn newest_first(&self, filter: &OrderFilter) -> Vec<Order> {
        let mut rows = self.sorted(filter);
        rows.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        rows.into_iter().map(|row| row.order).collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<Order, ServiceError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(ServiceError::ValidationError(format!(
                "Order {} already exists",
                order.id
            ))),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                slot.insert(StoredOrder {
                    seq,
                    order: order.clone(),
                });
                Ok(order.clone())
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, ServiceError> {
        Ok(self.orders.get(&id).map(|row| row.order.clone()))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        Ok(self
            .newest_first(&OrderFilter::default())
            .into_iter()
            .filter(|order| order.user_id == user_id)
            .collect())
    }

    async fn find_all(
        &self,
        filter: &OrderFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Order>, u64), ServiceError> {
        let rows = self.newest_first(filter);
        let total = rows.len() as u64;
        let skip = page.saturating_sub(1).saturating_mul(page_size) as usize;
        let items = rows
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .collect();
        Ok((items, total))
    }

    async fn count(&self, filter: &OrderFilter) -> Result<u64, ServiceError> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| filter.matches(&entry.value().order))
            .count() as u64)
    }

    async fn all(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self
            .sorted(&OrderFilter::default())
            .into_iter()
            .map(|row| row.order)
            .collect())
    }

    async fn update(&self, order: &Order) -> Result<Order, ServiceError> {
        // The shard lock is held for the whole check-and-write.
        let mut row = self
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| ServiceError::order_not_found(order.id))?;

        if row.order.version != order.version {
            return Err(ServiceError::ConcurrentModification(order.id));
        }

        let mut stored = order.clone();
        stored.version += 1;
        row.order = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        Ok(self.orders.remove(&id).is_some())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<Uuid, UserSummary>,
    products: DashMap<Uuid, ProductSummary>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, name: impl Into<String>, email: impl Into<String>) -> UserSummary {
        let user = UserSummary {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
        };
        self.users.insert(user.id, user.clone());
        user
    }

    pub fn add_product(&self, name: impl Into<String>) -> ProductSummary {
        let product = ProductSummary {
            id: Uuid::new_v4(),
            name: name.into(),
        };
        self.products.insert(product.id, product.clone());
        product
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectory {
    async fn count_users(&self) -> Result<u64, ServiceError> {
        Ok(self.users.len() as u64)
    }

    async fn count_products(&self) -> Result<u64, ServiceError> {
        Ok(self.products.len() as u64)
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, ServiceError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|user| user.clone()))
            .collect())
    }
}
