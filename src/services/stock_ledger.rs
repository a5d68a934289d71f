//! Conditional stock decrements and releases.
//!
//! Every mutation is a single `UPDATE ... WHERE stock >= n` evaluated by the
//! database, so concurrent reservations against the same product serialize on
//! the row and can never drive stock negative.

use crate::{entities::product, errors::ServiceError};
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Result of a successful reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// Stock was decremented by the requested quantity
    Decremented,
    /// The product is not stock-tracked
    Untracked,
}

/// Reserve `quantity` units of a product, or fail with `InsufficientStock`.
#[instrument(skip(conn))]
pub async fn reserve<C>(conn: &C, product_id: Uuid, quantity: i32) -> Result<Reservation, ServiceError>
where
    C: ConnectionTrait,
{
    if quantity <= 0 {
        return Err(ServiceError::InvalidCartLine {
            product: product_id.to_string(),
            reason: "quantity must be positive".to_string(),
        });
    }

    let result = product::Entity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.is_not_null())
        .filter(product::Column::Stock.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 1 {
        debug!(%product_id, quantity, "stock reserved");
        return Ok(Reservation::Decremented);
    }

    let current = product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

    match current.stock {
        None => Ok(Reservation::Untracked),
        Some(available) => Err(ServiceError::InsufficientStock {
            product: current.name,
            requested: quantity,
            available,
        }),
    }
}

/// Return previously reserved units to a tracked product. Untracked products are left alone.
#[instrument(skip(conn))]
pub async fn release<C>(conn: &C, product_id: Uuid, quantity: i32) -> Result<bool, ServiceError>
where
    C: ConnectionTrait,
{
    if quantity <= 0 {
        return Ok(false);
    }

    let result = product::Entity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.is_not_null())
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}
