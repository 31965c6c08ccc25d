use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{BaseRepository, OrderFilter, OrderStore, Repository};
use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as OrderEntity, Model as OrderModel,
};
use crate::errors::ServiceError;
use crate::models::Order;

/// Order store backed by the `orders` table.
#[derive(Debug, Clone)]
pub struct SeaOrmOrderStore {
    base: BaseRepository,
}

impl SeaOrmOrderStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn filtered(filter: &OrderFilter) -> Select<OrderEntity> {
        let query = OrderEntity::find();
        match filter.status {
            Some(status) => query.filter(Column::Status.eq(status.as_ref())),
            None => query,
        }
    }

    fn to_document(order: &Order) -> Result<serde_json::Value, ServiceError> {
        serde_json::to_value(order).map_err(|e| {
            ServiceError::InternalError(format!("Failed to serialize order {}: {}", order.id, e))
        })
    }

    /// The scalar `version` column is authoritative over the copy in the document.
    fn from_model(model: OrderModel) -> Result<Order, ServiceError> {
        let mut order: Order = serde_json::from_value(model.document).map_err(|e| {
            ServiceError::InternalError(format!("Corrupt order document {}: {}", model.id, e))
        })?;
        order.version = model.version;
        Ok(order)
    }

    fn from_models(models: Vec<OrderModel>) -> Result<Vec<Order>, ServiceError> {
        models.into_iter().map(Self::from_model).collect()
    }
}

#[async_trait]
impl OrderStore for SeaOrmOrderStore {
    async fn create(&self, order: &Order) -> Result<Order, ServiceError> {
        let model = OrderActiveModel {
            id: Set(order.id),
            user_id: Set(order.user_id),
            status: Set(order.status.to_string()),
            version: Set(order.version),
            document: Set(Self::to_document(order)?),
            created_at: Set(order.created_at),
            updated_at: Set(order.updated_at),
        }
        .insert(self.base.get_db())
        .await?;

        Self::from_model(model)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, ServiceError> {
        OrderEntity::find_by_id(id)
            .one(self.base.get_db())
            .await?
            .map(Self::from_model)
            .transpose()
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        let models = OrderEntity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .all(self.base.get_db())
            .await?;
        Self::from_models(models)
    }

    async fn find_all(
        &self,
        filter: &OrderFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Order>, u64), ServiceError> {
        let paginator = Self::filtered(filter)
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .paginate(self.base.get_db(), page_size.max(1));

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((Self::from_models(models)?, total))
    }

    async fn count(&self, filter: &OrderFilter) -> Result<u64, ServiceError> {
        Ok(Self::filtered(filter).count(self.base.get_db()).await?)
    }

    async fn all(&self) -> Result<Vec<Order>, ServiceError> {
        let models = OrderEntity::find()
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await?;
        Self::from_models(models)
    }

    async fn update(&self, order: &Order) -> Result<Order, ServiceError> {
        let mut next = order.clone();
        next.version = order.version + 1;

        let changes = OrderActiveModel {
            status: Set(next.status.to_string()),
            version: Set(next.version),
            document: Set(Self::to_document(&next)?),
            updated_at: Set(next.updated_at),
            ..Default::default()
        };

        let result = OrderEntity::update_many()
            .set(changes)
            .filter(Column::Id.eq(order.id))
            .filter(Column::Version.eq(order.version))
            .exec(self.base.get_db())
            .await?;

        if result.rows_affected == 0 {
            let exists = OrderEntity::find_by_id(order.id)
                .one(self.base.get_db())
                .await?
                .is_some();
            if !exists {
                return Err(ServiceError::order_not_found(order.id));
            }
            debug!(order_id = %order.id, version = order.version, "stale order version");
            return Err(ServiceError::ConcurrentModification(order.id));
        }

        Ok(next)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let result = OrderEntity::delete_by_id(id)
            .exec(self.base.get_db())
            .await?;
        Ok(result.rows_affected > 0)
    }
}
