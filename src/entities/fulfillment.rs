use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Supplier-scoped slice of an order. Unique per (order_id, supplier_id).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fulfillments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub supplier_id: Uuid,
    pub status: FulfillmentStatus,
    pub carrier: String,
    pub tracking_number: String,
    #[sea_orm(nullable)]
    pub tracking_url: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub supplier_subtotal: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStatus {
    /// Waiting on payment before the supplier is contacted
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Handed to the supplier
    #[sea_orm(string_value = "PLACED")]
    Placed,
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    #[sea_orm(string_value = "SHIPPED")]
    Shipped,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Placed => "PLACED",
            Self::Accepted => "ACCEPTED",
            Self::Shipped => "SHIPPED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        }
    }

    /// Supplier updates only move forward. Resending the current status is
    /// allowed so tracking details can be corrected; CANCELLED, FAILED and
    /// SHIPPED are final.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use FulfillmentStatus::*;
        if *self == next {
            return true;
        }
        match self {
            Pending => matches!(next, Placed | Accepted | Shipped | Cancelled | Failed),
            Placed => matches!(next, Accepted | Shipped | Cancelled | Failed),
            Accepted => matches!(next, Shipped | Cancelled | Failed),
            Shipped | Cancelled | Failed => false,
        }
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts canonical names plus the supplier-facing aliases
/// CREATED, SENT and CONFIRMED.
impl FromStr for FulfillmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" | "CREATED" => Ok(Self::Pending),
            "PLACED" | "SENT" => Ok(Self::Placed),
            "ACCEPTED" | "CONFIRMED" => Ok(Self::Accepted),
            "SHIPPED" => Ok(Self::Shipped),
            "CANCELLED" | "CANCELED" => Ok(Self::Cancelled),
            "FAILED" => Ok(Self::Failed),
            _ => Err(s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("CREATED", FulfillmentStatus::Pending)]
    #[case("sent", FulfillmentStatus::Placed)]
    #[case("Confirmed", FulfillmentStatus::Accepted)]
    #[case("SHIPPED", FulfillmentStatus::Shipped)]
    #[case(" placed ", FulfillmentStatus::Placed)]
    fn parses_canonical_names_and_aliases(#[case] raw: &str, #[case] expected: FulfillmentStatus) {
        assert_eq!(raw.parse::<FulfillmentStatus>(), Ok(expected));
    }

    #[rstest]
    #[case(FulfillmentStatus::Placed, FulfillmentStatus::Accepted, true)]
    #[case(FulfillmentStatus::Accepted, FulfillmentStatus::Shipped, true)]
    #[case(FulfillmentStatus::Shipped, FulfillmentStatus::Shipped, true)]
    #[case(FulfillmentStatus::Cancelled, FulfillmentStatus::Cancelled, true)]
    #[case(FulfillmentStatus::Placed, FulfillmentStatus::Pending, false)]
    #[case(FulfillmentStatus::Shipped, FulfillmentStatus::Cancelled, false)]
    #[case(FulfillmentStatus::Cancelled, FulfillmentStatus::Shipped, false)]
    #[case(FulfillmentStatus::Failed, FulfillmentStatus::Placed, false)]
    fn transitions_only_move_forward(
        #[case] from: FulfillmentStatus,
        #[case] to: FulfillmentStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn rejects_unknown_status() {
        assert!("LOST".parse::<FulfillmentStatus>().is_err());
    }
}
