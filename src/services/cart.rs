use crate::{
    entities::{cart_item, product},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Cart row joined with its product's current price
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartSummary {
    pub total_items: i64,
    /// Rounded to 2 decimal places
    pub total_price: Decimal,
}

/// Per-user cart storage consumed by checkout
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<CartLineView>, ServiceError> {
        let rows = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::AddedAt)
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(item, product)| {
                product.map(|p| {
                    let unit_price = p.price.round_dp(2);
                    CartLineView {
                        id: item.id,
                        product_id: p.id,
                        product_name: p.name,
                        quantity: item.quantity,
                        unit_price,
                        line_total: (unit_price * Decimal::from(item.quantity)).round_dp(2),
                    }
                })
            })
            .collect())
    }

    /// Adds a product, merging into the existing line for the same product.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        product::Entity::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .lock_exclusive()
            .one(&txn)
            .await?;

        let saved = match existing {
            Some(item) => {
                let merged = item.quantity.saturating_add(quantity);
                let mut update: cart_item::ActiveModel = item.into();
                update.quantity = Set(merged);
                update.update(&txn).await?
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    added_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?
            }
        };

        txn.commit().await?;
        info!(cart_item_id = %saved.id, quantity = saved.quantity, "cart line saved");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }
        let item = self.owned_item(user_id, item_id).await?;
        let mut update: cart_item::ActiveModel = item.into();
        update.quantity = Set(quantity);
        Ok(update.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let result = cart_item::Entity::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Cart item {} not found", item_id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn summary(&self, user_id: Uuid) -> Result<CartSummary, ServiceError> {
        let lines = self.list(user_id).await?;
        let total_items = lines.iter().map(|l| i64::from(l.quantity)).sum();
        let total_price = lines
            .iter()
            .fold(Decimal::ZERO, |acc, l| acc + l.line_total)
            .round_dp(2);
        Ok(CartSummary {
            total_items,
            total_price,
        })
    }

    async fn owned_item(&self, user_id: Uuid, item_id: Uuid) -> Result<cart_item::Model, ServiceError> {
        cart_item::Entity::find_by_id(item_id)
            .filter(cart_item::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))
    }
}
