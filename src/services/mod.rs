pub mod address;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod cod_eligibility;
pub mod fulfillment_splitter;
pub mod fulfillments;
pub mod order_assembler;
pub mod orders;
pub mod payment_gateway;
pub mod payment_reconciler;
pub mod stock_ledger;
