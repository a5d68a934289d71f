use crate::{
    entities::{fulfillment, order, order_item, payment},
    errors::ServiceError,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<order::Model>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub fulfillments: Vec<fulfillment::Model>,
    pub payment: Option<payment::Model>,
}

/// Read-only, owner-scoped order queries
#[derive(Clone)]
pub struct OrderQueryService {
    db: Arc<DatabaseConnection>,
}

impl OrderQueryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Caller's orders, newest first. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> Result<OrderPage, ServiceError> {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);

        let paginator = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderPage {
            orders,
            page,
            per_page,
            total,
        })
    }

    /// Another user's order is reported as not found.
    #[instrument(skip(self))]
    pub async fn get_for_user(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order
            .find_related(order_item::Entity)
            .all(&*self.db)
            .await?;
        let fulfillments = order
            .find_related(fulfillment::Entity)
            .order_by_asc(fulfillment::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        let payment = order
            .find_related(payment::Entity)
            .one(&*self.db)
            .await?;

        Ok(OrderDetail {
            order,
            items,
            fulfillments,
            payment,
        })
    }
}
