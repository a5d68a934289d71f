//! Cart to order conversion.
//!
//! One checkout is one database transaction:
//! lock cart -> validate -> reserve stock -> assemble order -> split
//! fulfillments -> payment record or cart clear -> commit.
//! Any error drops the transaction, which rolls every write back.

use super::{
    address::{AddressValidator, ShippingAddress},
    catalog::{self, CartLine},
    cod_eligibility,
    fulfillment_splitter::{self, FulfillmentDraft},
    order_assembler::{self, CustomerSnapshot, OrderDraft},
    payment_gateway::PaymentGateway,
    stock_ledger,
};
use crate::{
    auth::AuthUser,
    entities::{
        cart_item, fulfillment,
        order::{self, OrderStatus, PaymentMethod, PaymentStatus},
        order_item, payment,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    /// `COD` or `ONLINE`, case-insensitive; COD when absent or blank
    pub payment_method: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
}

/// Everything written by a committed checkout
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub fulfillments: Vec<fulfillment::Model>,
    pub payment: Option<payment::Model>,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    address_validator: Arc<dyn AddressValidator>,
    event_sender: Arc<EventSender>,
    timeout: Duration,
}

/// Resolve the requested payment method, defaulting to COD.
pub fn parse_payment_method(raw: Option<&str>) -> Result<PaymentMethod, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(PaymentMethod::default()),
        Some(value) => value
            .parse::<PaymentMethod>()
            .map_err(ServiceError::InvalidPaymentMethod),
    }
}

/// Every line needs a positive quantity and a price that is still positive
/// once rounded to cents.
pub fn validate_lines(lines: &[CartLine]) -> Result<(), ServiceError> {
    for line in lines {
        if line.quantity <= 0 {
            return Err(ServiceError::InvalidCartLine {
                product: line.product.name.clone(),
                reason: "quantity must be positive".to_string(),
            });
        }
        if line.product.price.round_dp(2) <= rust_decimal::Decimal::ZERO {
            return Err(ServiceError::InvalidCartLine {
                product: line.product.name.clone(),
                reason: "price must be positive".to_string(),
            });
        }
    }
    Ok(())
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        address_validator: Arc<dyn AddressValidator>,
        event_sender: Arc<EventSender>,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            gateway,
            address_validator,
            event_sender,
            timeout,
        }
    }

    /// Convert the caller's cart into an order.
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn checkout(
        &self,
        user: &AuthUser,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let shipping_address = self.check_address(request.shipping_address)?;

        let result = match tokio::time::timeout(
            self.timeout,
            self.run(user, request.payment_method.as_deref(), shipping_address),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.timeout, "checkout transaction timed out; rolled back");
                Err(ServiceError::Timeout)
            }
        };

        match &result {
            Ok(outcome) => {
                metrics::counter!(
                    "dropship_checkouts_total",
                    1,
                    "result" => "ok",
                    "payment_method" => outcome.order.payment_method.as_str()
                );
                self.publish(&outcome.order).await;
            }
            Err(err) => {
                metrics::counter!("dropship_checkouts_total", 1, "result" => err.kind());
            }
        }

        result
    }

    /// Field rules then the external validator; no transaction is open yet.
    fn check_address(
        &self,
        address: Option<ShippingAddress>,
    ) -> Result<Option<String>, ServiceError> {
        let Some(address) = address else {
            return Ok(None);
        };
        address
            .validate()
            .map_err(|e| ServiceError::InvalidAddress(e.to_string()))?;
        self.address_validator
            .validate(&address)
            .map_err(ServiceError::InvalidAddress)?;
        serde_json::to_string(&address)
            .map(Some)
            .map_err(|e| ServiceError::InternalError(format!("address encoding failed: {}", e)))
    }

    async fn run(
        &self,
        user: &AuthUser,
        payment_method: Option<&str>,
        shipping_address: Option<String>,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let lines = catalog::load_locked_cart(&txn, user.user_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        reject_if_payment_outstanding(&txn, user.user_id).await?;

        let method = parse_payment_method(payment_method)?;
        validate_lines(&lines)?;

        let verdict = cod_eligibility::evaluate(&lines);
        if method == PaymentMethod::Cod && !verdict.allowed {
            return Err(ServiceError::CodNotEligible {
                product: verdict.blocking_product.unwrap_or_default(),
            });
        }

        reserve_stock(&txn, &lines).await?;

        let now = Utc::now();
        let draft = order_assembler::assemble(
            CustomerSnapshot {
                user_id: user.user_id,
                name: user.display_name(),
                email: user.contact_email(),
            },
            &lines,
            method,
            verdict.allowed,
            shipping_address,
            now,
        );
        let splits = fulfillment_splitter::split(&draft);

        let (order, items, fulfillments) = persist_order(&txn, &draft, &splits, now).await?;

        let payment = match method {
            PaymentMethod::Online => Some(self.open_payment(&txn, &order, now).await?),
            PaymentMethod::Cod => {
                let ids: Vec<Uuid> = lines.iter().map(|l| l.cart_item_id).collect();
                cart_item::Entity::delete_many()
                    .filter(cart_item::Column::Id.is_in(ids))
                    .exec(&txn)
                    .await?;
                None
            }
        };

        txn.commit().await?;

        info!(
            order_id = %order.id,
            payment_method = %order.payment_method,
            total = %order.total_price,
            fulfillments = fulfillments.len(),
            "checkout committed"
        );

        Ok(CheckoutOutcome {
            order,
            items,
            fulfillments,
            payment,
        })
    }

    async fn open_payment(
        &self,
        txn: &DatabaseTransaction,
        order: &order::Model,
        now: chrono::DateTime<Utc>,
    ) -> Result<payment::Model, ServiceError> {
        let record = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            provider: Set(self.gateway.provider().to_string()),
            provider_order_id: Set(self.gateway.provider_order_id(order.id)),
            provider_payment_id: Set(None),
            amount: Set(order.total_price),
            status: Set(PaymentStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(record.insert(txn).await?)
    }

    async fn publish(&self, order: &order::Model) {
        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                user_id: order.user_id,
                payment_method: order.payment_method,
                total_price: order.total_price,
                customer_email: order.customer_email.clone(),
                confirmed: order.payment_method == PaymentMethod::Cod,
                at: order.created_at,
            })
            .await;
    }
}

/// An ONLINE checkout keeps the cart until capture, so the same lines must
/// not be ordered again while that payment is open.
async fn reject_if_payment_outstanding(
    txn: &DatabaseTransaction,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    let pending = order::Entity::find()
        .filter(order::Column::UserId.eq(user_id))
        .filter(order::Column::Status.eq(OrderStatus::PaymentPending))
        .one(txn)
        .await?;
    match pending {
        Some(order) => Err(ServiceError::PaymentPending(order.id)),
        None => Ok(()),
    }
}

/// Reserve per product in ascending id order so concurrent checkouts over
/// overlapping products take row locks in the same order.
async fn reserve_stock(txn: &DatabaseTransaction, lines: &[CartLine]) -> Result<(), ServiceError> {
    let mut wanted: BTreeMap<Uuid, (&str, i32)> = BTreeMap::new();
    for line in lines {
        let entry = wanted
            .entry(line.product.id)
            .or_insert((line.product.name.as_str(), 0));
        entry.1 += line.quantity;
    }

    for (product_id, (name, quantity)) in wanted {
        stock_ledger::reserve(txn, product_id, quantity)
            .await
            .map_err(|err| match err {
                ServiceError::NotFound(_) => ServiceError::InvalidCartLine {
                    product: name.to_string(),
                    reason: "product no longer exists".to_string(),
                },
                other => other,
            })?;
    }
    Ok(())
}

async fn persist_order(
    txn: &DatabaseTransaction,
    draft: &OrderDraft,
    splits: &[FulfillmentDraft],
    now: chrono::DateTime<Utc>,
) -> Result<
    (
        order::Model,
        Vec<order_item::Model>,
        Vec<fulfillment::Model>,
    ),
    ServiceError,
> {
    let order = draft.order_active_model().insert(txn).await?;

    let mut items = Vec::with_capacity(draft.items.len());
    for item in draft.item_active_models() {
        items.push(item.insert(txn).await?);
    }

    let mut fulfillments = Vec::with_capacity(splits.len());
    for split in splits {
        fulfillments.push(split.active_model(now).insert(txn).await?);
    }

    Ok((order, items, fulfillments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::ProductSnapshot;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn line(name: &str, price: rust_decimal::Decimal, qty: i32) -> CartLine {
        CartLine {
            cart_item_id: Uuid::new_v4(),
            quantity: qty,
            product: ProductSnapshot {
                id: Uuid::new_v4(),
                name: name.into(),
                price,
                stock: None,
                cod_allowed: true,
                dropship_cost: None,
                supplier: None,
            },
        }
    }

    #[test]
    fn payment_method_defaults_to_cod() {
        assert_eq!(parse_payment_method(None).unwrap(), PaymentMethod::Cod);
        assert_eq!(parse_payment_method(Some("  ")).unwrap(), PaymentMethod::Cod);
        assert_eq!(
            parse_payment_method(Some("online")).unwrap(),
            PaymentMethod::Online
        );
    }

    #[test]
    fn unknown_payment_method_is_rejected() {
        assert_matches!(
            parse_payment_method(Some("CARD")),
            Err(ServiceError::InvalidPaymentMethod(v)) if v == "CARD"
        );
    }

    #[test]
    fn invalid_lines_name_the_product() {
        assert_matches!(
            validate_lines(&[line("Ok", dec!(1.00), 1), line("Zero", dec!(1.00), 0)]),
            Err(ServiceError::InvalidCartLine { product, .. }) if product == "Zero"
        );
        assert_matches!(
            validate_lines(&[line("Free", dec!(0.00), 1)]),
            Err(ServiceError::InvalidCartLine { product, .. }) if product == "Free"
        );
        assert!(validate_lines(&[line("Ok", dec!(0.01), 3)]).is_ok());
    }

    #[test]
    fn sub_cent_price_is_rejected() {
        assert_matches!(
            validate_lines(&[line("Crumb", dec!(0.004), 1)]),
            Err(ServiceError::InvalidCartLine { product, .. }) if product == "Crumb"
        );
        assert!(validate_lines(&[line("Cent", dec!(0.006), 1)]).is_ok());
    }
}
