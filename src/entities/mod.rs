pub mod cart_item;
pub mod fulfillment;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod supplier;
