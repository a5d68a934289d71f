use crate::{
    events::EventSender,
    services::{
        address::AddressValidator, cart::CartService, checkout::CheckoutService,
        fulfillments::FulfillmentService, orders::OrderQueryService,
        payment_gateway::PaymentGateway, payment_reconciler::PaymentReconciler,
    },
};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};

pub mod cart;
pub mod checkout;
pub mod common;
pub mod dropship;
pub mod orders;
pub mod payment_webhooks;

/// Service container shared by the handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentReconciler>,
    pub fulfillments: Arc<FulfillmentService>,
    pub orders: Arc<OrderQueryService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        address_validator: Arc<dyn AddressValidator>,
        transaction_timeout: Duration,
    ) -> Self {
        Self {
            cart: Arc::new(CartService::new(db.clone())),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                gateway,
                address_validator,
                event_sender.clone(),
                transaction_timeout,
            )),
            payments: Arc::new(PaymentReconciler::new(
                db.clone(),
                event_sender.clone(),
                transaction_timeout,
            )),
            fulfillments: Arc::new(FulfillmentService::new(
                db.clone(),
                event_sender,
                transaction_timeout,
            )),
            orders: Arc::new(OrderQueryService::new(db)),
        }
    }
}
