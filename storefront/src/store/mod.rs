// storefront/src/store/mod.rs

//! Persistence seams consumed by the checkout. Every call commits on its own.

pub mod memory;
pub mod postgres;

use crate::errors::Result as AppResult;
use crate::models::{License, NewLicense, NewOrder, NewOrderItem, Order, OrderItem, PaymentStatus, Product};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait OrderRepository: Send + Sync {
  /// Persists a new order in `Pending` state.
  async fn create_order(&self, new_order: NewOrder) -> AppResult<Order>;

  async fn create_order_items(&self, order_id: Uuid, items: &[NewOrderItem]) -> AppResult<Vec<OrderItem>>;

  /// Moves the order to `to` only while its status is one of `from`, recording the
  /// processor payment id when given. Returns `None` when the order was not in an
  /// expected state, so concurrent reconciliations cannot both win the transition.
  async fn transition_payment_status(
    &self,
    order_id: Uuid,
    from: &[PaymentStatus],
    to: PaymentStatus,
    payment_id: Option<&str>,
  ) -> AppResult<Option<Order>>;

  async fn find_order(&self, order_id: Uuid) -> AppResult<Option<Order>>;

  async fn find_order_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Order>>;

  async fn list_order_items(&self, order_id: Uuid) -> AppResult<Vec<OrderItem>>;

  async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>>;

  /// Orders still awaiting confirmation, with a payment id, last touched and last checked
  /// before `older_than`. Never-checked orders come first, then the least recently checked.
  async fn list_unsettled_orders(&self, older_than: DateTime<Utc>, limit: i64) -> AppResult<Vec<Order>>;

  /// Stamps `last_reconciled_at` without touching status or `updated_at`.
  async fn mark_reconciled(&self, order_id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait LicenseRepository: Send + Sync {
  async fn create_license(&self, new_license: NewLicense) -> AppResult<License>;

  async fn list_licenses_for_user(&self, user_id: Uuid) -> AppResult<Vec<License>>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
  /// Products for the given ids. Unknown ids are simply absent from the result.
  async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>>;
}

/// The cart lives with the storefront client; checkout only asks for it to be emptied.
#[async_trait]
pub trait CartCollaborator: Send + Sync {
  async fn clear_cart(&self, user_id: Uuid) -> AppResult<()>;
}
