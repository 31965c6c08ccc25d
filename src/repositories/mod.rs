use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Order, OrderStatus, UserSummary};

pub mod directory_repository;
pub mod in_memory;
pub mod order_repository;

pub use directory_repository::SeaOrmDirectory;
pub use in_memory::{InMemoryDirectory, InMemoryOrderStore};
pub use order_repository::SeaOrmOrderStore;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Listing filter for administrative order queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn with_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |status| order.status == status)
    }
}

/// Durable order storage.
///
/// `update` is a compare-and-swap on [`Order::version`]: it succeeds only when
/// the stored version equals the one on the passed order, and returns the
/// order with the version bumped.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: &Order) -> Result<Order, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, ServiceError>;

    /// Newest first.
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError>;

    /// Newest first; `page` is 1-based. Returns the page and the total match count.
    async fn find_all(
        &self,
        filter: &OrderFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Order>, u64), ServiceError>;

    async fn count(&self, filter: &OrderFilter) -> Result<u64, ServiceError>;

    /// Every order in creation order, oldest first.
    ///
    /// Orders sharing a `created_at` keep insertion order in memory; the SQL
    /// store has no insertion sequence and orders them by id instead.
    async fn all(&self) -> Result<Vec<Order>, ServiceError>;

    async fn update(&self, order: &Order) -> Result<Order, ServiceError>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError>;
}

/// Read-only view of the user and product collections.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn count_users(&self) -> Result<u64, ServiceError>;

    async fn count_products(&self) -> Result<u64, ServiceError>;

    /// Unknown ids are silently absent from the result.
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, ServiceError>;
}
