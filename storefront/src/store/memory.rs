// storefront/src/store/memory.rs

//! Process-local store for development runs and tests.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{License, NewLicense, NewOrder, NewOrderItem, Order, OrderItem, PaymentStatus, Product};
use crate::store::{CartCollaborator, LicenseRepository, OrderRepository, ProductCatalog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::types::Json;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
  orders: HashMap<Uuid, Order>,
  order_items: Vec<OrderItem>,
  licenses: Vec<License>,
  license_keys: HashSet<String>,
  products: HashMap<Uuid, Product>,
  cleared_carts: Vec<Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
  tables: RwLock<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert_product(&self, product: Product) {
    self.tables.write().products.insert(product.id, product);
  }

  pub fn order_count(&self) -> usize {
    self.tables.read().orders.len()
  }

  pub fn all_orders(&self) -> Vec<Order> {
    self.tables.read().orders.values().cloned().collect()
  }

  pub fn all_licenses(&self) -> Vec<License> {
    self.tables.read().licenses.clone()
  }

  /// Users whose cart was cleared, in call order.
  pub fn cleared_carts(&self) -> Vec<Uuid> {
    self.tables.read().cleared_carts.clone()
  }

  /// Backdates an order's `updated_at`, making it visible to the unsettled-order sweep.
  pub fn age_order(&self, order_id: Uuid, by: chrono::Duration) {
    if let Some(order) = self.tables.write().orders.get_mut(&order_id) {
      order.updated_at -= by;
    }
  }
}

#[async_trait]
impl OrderRepository for MemoryStore {
  async fn create_order(&self, new_order: NewOrder) -> AppResult<Order> {
    let now = Utc::now();
    let order = Order {
      id: Uuid::new_v4(),
      user_id: new_order.user_id,
      total: new_order.total,
      billing_address: Json(new_order.billing_address),
      shipping_address: Json(new_order.shipping_address),
      payment_status: PaymentStatus::Pending,
      invoice_url: None,
      external_id: new_order.external_id,
      created_at: now,
      updated_at: now,
      last_reconciled_at: None,
    };
    let mut tables = self.tables.write();
    if tables.orders.values().any(|o| o.external_id == order.external_id) {
      return Err(AppError::Validation(format!(
        "An order with external id {} already exists.",
        order.external_id
      )));
    }
    tables.orders.insert(order.id, order.clone());
    Ok(order)
  }

  async fn create_order_items(&self, order_id: Uuid, items: &[NewOrderItem]) -> AppResult<Vec<OrderItem>> {
    let mut tables = self.tables.write();
    if !tables.orders.contains_key(&order_id) {
      return Err(AppError::NotFound(format!("Order {} not found", order_id)));
    }
    let now = Utc::now();
    let created: Vec<OrderItem> = items
      .iter()
      .map(|item| OrderItem {
        id: Uuid::new_v4(),
        order_id,
        product_id: item.product_id,
        quantity: item.quantity,
        price: item.price,
        created_at: now,
      })
      .collect();
    tables.order_items.extend(created.iter().cloned());
    Ok(created)
  }

  async fn transition_payment_status(
    &self,
    order_id: Uuid,
    from: &[PaymentStatus],
    to: PaymentStatus,
    payment_id: Option<&str>,
  ) -> AppResult<Option<Order>> {
    let mut tables = self.tables.write();
    let order = tables
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
    if !from.contains(&order.payment_status) {
      return Ok(None);
    }
    order.payment_status = to;
    if let Some(id) = payment_id {
      order.invoice_url = Some(id.to_string());
    }
    order.updated_at = Utc::now();
    Ok(Some(order.clone()))
  }

  async fn find_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
    Ok(self.tables.read().orders.get(&order_id).cloned())
  }

  async fn find_order_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Order>> {
    Ok(
      self
        .tables
        .read()
        .orders
        .values()
        .find(|o| o.payment_id() == Some(payment_id))
        .cloned(),
    )
  }

  async fn list_order_items(&self, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(
      self
        .tables
        .read()
        .order_items
        .iter()
        .filter(|i| i.order_id == order_id)
        .cloned()
        .collect(),
    )
  }

  async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
    let mut orders: Vec<Order> = self
      .tables
      .read()
      .orders
      .values()
      .filter(|o| o.user_id == user_id)
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(orders)
  }

  async fn list_unsettled_orders(&self, older_than: DateTime<Utc>, limit: i64) -> AppResult<Vec<Order>> {
    let mut orders: Vec<Order> = self
      .tables
      .read()
      .orders
      .values()
      .filter(|o| {
        o.payment_status.awaits_confirmation()
          && o.payment_id().is_some()
          && o.updated_at < older_than
          && o.last_reconciled_at.map_or(true, |at| at < older_than)
      })
      .cloned()
      .collect();
    // Never-checked orders first (None sorts before Some), then least recently checked.
    orders.sort_by(|a, b| {
      a.last_reconciled_at
        .cmp(&b.last_reconciled_at)
        .then(a.updated_at.cmp(&b.updated_at))
    });
    orders.truncate(limit.max(0) as usize);
    Ok(orders)
  }

  async fn mark_reconciled(&self, order_id: Uuid) -> AppResult<()> {
    let mut tables = self.tables.write();
    let order = tables
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
    order.last_reconciled_at = Some(Utc::now());
    Ok(())
  }
}

#[async_trait]
impl LicenseRepository for MemoryStore {
  async fn create_license(&self, new_license: NewLicense) -> AppResult<License> {
    let mut tables = self.tables.write();
    if !tables.license_keys.insert(new_license.license_key.clone()) {
      return Err(AppError::Validation(format!(
        "License key {} already issued.",
        new_license.license_key
      )));
    }
    let license = License {
      id: Uuid::new_v4(),
      product_id: new_license.product_id,
      user_id: new_license.user_id,
      license_key: new_license.license_key,
      is_active: new_license.is_active,
      expiry_date: new_license.expiry_date,
      created_at: Utc::now(),
    };
    tables.licenses.push(license.clone());
    Ok(license)
  }

  async fn list_licenses_for_user(&self, user_id: Uuid) -> AppResult<Vec<License>> {
    Ok(
      self
        .tables
        .read()
        .licenses
        .iter()
        .filter(|l| l.user_id == user_id)
        .cloned()
        .collect(),
    )
  }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
  async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
    let tables = self.tables.read();
    Ok(ids.iter().filter_map(|id| tables.products.get(id).cloned()).collect())
  }
}

#[async_trait]
impl CartCollaborator for MemoryStore {
  async fn clear_cart(&self, user_id: Uuid) -> AppResult<()> {
    self.tables.write().cleared_carts.push(user_id);
    Ok(())
  }
}
