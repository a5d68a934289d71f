//! Read model over products, suppliers and cart rows used by checkout.

use crate::{
    entities::{cart_item, product, supplier},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierSnapshot {
    pub id: Uuid,
    pub name: String,
    pub supports_cod: bool,
    pub lead_time_days: i32,
}

impl From<supplier::Model> for SupplierSnapshot {
    fn from(s: supplier::Model) -> Self {
        Self {
            id: s.id,
            name: s.name,
            supports_cod: s.supports_cod,
            lead_time_days: s.lead_time_days,
        }
    }
}

/// Product state as seen at the moment the cart was locked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    /// `None` when the product does not track stock
    pub stock: Option<i32>,
    pub cod_allowed: bool,
    pub dropship_cost: Option<Decimal>,
    pub supplier: Option<SupplierSnapshot>,
}

impl ProductSnapshot {
    pub fn from_models(product: product::Model, supplier: Option<supplier::Model>) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
            stock: product.stock,
            cod_allowed: product.cod_allowed,
            dropship_cost: product.dropship_cost,
            supplier: supplier.map(SupplierSnapshot::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub cart_item_id: Uuid,
    pub quantity: i32,
    pub product: ProductSnapshot,
}

/// Load the user's cart with its rows locked for the rest of the transaction.
#[instrument(skip(conn))]
pub async fn load_locked_cart<C>(conn: &C, user_id: Uuid) -> Result<Vec<CartLine>, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = cart_item::Entity::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .order_by_asc(cart_item::Column::AddedAt)
        .order_by_asc(cart_item::Column::Id)
        .lock_exclusive()
        .all(conn)
        .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids: Vec<Uuid> = rows.iter().map(|r| r.product_id).collect();
    let products: HashMap<Uuid, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let supplier_ids: Vec<Uuid> = products.values().filter_map(|p| p.supplier_id).collect();
    let suppliers: HashMap<Uuid, supplier::Model> = if supplier_ids.is_empty() {
        HashMap::new()
    } else {
        supplier::Entity::find()
            .filter(supplier::Column::Id.is_in(supplier_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect()
    };

    rows.into_iter()
        .map(|row| {
            let product = products.get(&row.product_id).cloned().ok_or_else(|| {
                ServiceError::InvalidCartLine {
                    product: row.product_id.to_string(),
                    reason: "product no longer exists".to_string(),
                }
            })?;
            let supplier = product
                .supplier_id
                .and_then(|sid| suppliers.get(&sid).cloned());
            Ok(CartLine {
                cart_item_id: row.id,
                quantity: row.quantity,
                product: ProductSnapshot::from_models(product, supplier),
            })
        })
        .collect()
}
