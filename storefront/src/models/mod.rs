// storefront/src/models/mod.rs

//! Records persisted by the store and the immutable inputs of a checkout.

pub mod billing;
pub mod cart;
pub mod license;
pub mod order;
pub mod order_item;
pub mod product;

pub use billing::{BillingAddress, BillingInfo};
pub use cart::{CartLine, CartSnapshot};
pub use license::{License, NewLicense};
pub use order::{NewOrder, Order, PaymentStatus};
pub use order_item::{NewOrderItem, OrderItem};
pub use product::Product;
