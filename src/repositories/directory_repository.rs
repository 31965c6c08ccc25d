use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use super::{BaseRepository, DirectoryStore, Repository};
use crate::entities::{product, user};
use crate::errors::ServiceError;
use crate::models::UserSummary;

/// Reads the `users` and `products` tables for reporting.
#[derive(Debug, Clone)]
pub struct SeaOrmDirectory {
    base: BaseRepository,
}

impl SeaOrmDirectory {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl DirectoryStore for SeaOrmDirectory {
    async fn count_users(&self) -> Result<u64, ServiceError> {
        Ok(user::Entity::find().count(self.base.get_db()).await?)
    }

    async fn count_products(&self) -> Result<u64, ServiceError> {
        Ok(product::Entity::find().count(self.base.get_db()).await?)
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .all(self.base.get_db())
            .await?;
        Ok(users
            .into_iter()
            .map(|u| UserSummary {
                id: u.id,
                name: u.name,
                email: u.email,
            })
            .collect())
    }
}
