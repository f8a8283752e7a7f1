// storefront/src/store/postgres.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{License, NewLicense, NewOrder, NewOrderItem, Order, OrderItem, PaymentStatus, Product};
use crate::store::{CartCollaborator, LicenseRepository, OrderRepository, ProductCatalog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{error, instrument};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, user_id, total, billing_address, shipping_address, payment_status, invoice_url, external_id, created_at, updated_at, last_reconciled_at";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price, created_at";
const LICENSE_COLUMNS: &str = "id, product_id, user_id, license_key, is_active, expiry_date, created_at";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str) -> AppResult<Self> {
    let pool = PgPool::connect(database_url).await.map_err(|e| {
      error!("Failed to connect to the database: {}", e);
      AppError::Sqlx(e)
    })?;
    Ok(Self::new(pool))
  }

  pub async fn run_migrations(&self) -> AppResult<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| AppError::Config(format!("Database migration failed: {}", e)))
  }
}

#[async_trait]
impl OrderRepository for PgStore {
  #[instrument(name = "store::create_order", skip(self, new_order), fields(user_id = %new_order.user_id, external_id = %new_order.external_id), err(Display))]
  async fn create_order(&self, new_order: NewOrder) -> AppResult<Order> {
    let sql = format!(
      "INSERT INTO orders (id, user_id, total, billing_address, shipping_address, payment_status, external_id) \
       VALUES ($1, $2, $3, $4, $5, 'pending', $6) RETURNING {}",
      ORDER_COLUMNS
    );
    let order = sqlx::query_as::<_, Order>(&sql)
      .bind(Uuid::new_v4())
      .bind(new_order.user_id)
      .bind(new_order.total)
      .bind(Json(new_order.billing_address))
      .bind(Json(new_order.shipping_address))
      .bind(new_order.external_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(order)
  }

  #[instrument(name = "store::create_order_items", skip(self, items), fields(num_items = items.len()), err(Display))]
  async fn create_order_items(&self, order_id: Uuid, items: &[NewOrderItem]) -> AppResult<Vec<OrderItem>> {
    let sql = format!(
      "INSERT INTO order_items (id, order_id, product_id, quantity, price) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
      ORDER_ITEM_COLUMNS
    );
    // All items commit together.
    let mut tx = self.pool.begin().await?;
    let mut created = Vec::with_capacity(items.len());
    for item in items {
      let row = sqlx::query_as::<_, OrderItem>(&sql)
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.price)
        .fetch_one(&mut *tx)
        .await?;
      created.push(row);
    }
    tx.commit().await?;
    Ok(created)
  }

  #[instrument(name = "store::transition_payment_status", skip(self, from), fields(to = %to), err(Display))]
  async fn transition_payment_status(
    &self,
    order_id: Uuid,
    from: &[PaymentStatus],
    to: PaymentStatus,
    payment_id: Option<&str>,
  ) -> AppResult<Option<Order>> {
    let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
    let sql = format!(
      "UPDATE orders SET payment_status = $2, invoice_url = COALESCE($3, invoice_url), updated_at = now() \
       WHERE id = $1 AND payment_status::text = ANY($4) RETURNING {}",
      ORDER_COLUMNS
    );
    let updated = sqlx::query_as::<_, Order>(&sql)
      .bind(order_id)
      .bind(to)
      .bind(payment_id)
      .bind(&from)
      .fetch_optional(&self.pool)
      .await?;
    if updated.is_none() && self.find_order(order_id).await?.is_none() {
      return Err(AppError::NotFound(format!("Order {} not found", order_id)));
    }
    Ok(updated)
  }

  async fn find_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    Ok(sqlx::query_as::<_, Order>(&sql).bind(order_id).fetch_optional(&self.pool).await?)
  }

  async fn find_order_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE invoice_url = $1 LIMIT 1", ORDER_COLUMNS);
    Ok(sqlx::query_as::<_, Order>(&sql).bind(payment_id).fetch_optional(&self.pool).await?)
  }

  async fn list_order_items(&self, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let sql = format!(
      "SELECT {} FROM order_items WHERE order_id = $1 ORDER BY created_at ASC",
      ORDER_ITEM_COLUMNS
    );
    Ok(sqlx::query_as::<_, OrderItem>(&sql).bind(order_id).fetch_all(&self.pool).await?)
  }

  async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
      ORDER_COLUMNS
    );
    Ok(sqlx::query_as::<_, Order>(&sql).bind(user_id).fetch_all(&self.pool).await?)
  }

  async fn list_unsettled_orders(&self, older_than: DateTime<Utc>, limit: i64) -> AppResult<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE payment_status IN ('pending', 'pending_review') \
       AND invoice_url IS NOT NULL AND updated_at < $1 \
       AND (last_reconciled_at IS NULL OR last_reconciled_at < $1) \
       ORDER BY last_reconciled_at ASC NULLS FIRST, updated_at ASC LIMIT $2",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Order>(&sql)
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn mark_reconciled(&self, order_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("UPDATE orders SET last_reconciled_at = now() WHERE id = $1")
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    if result.rows_affected() == 0 {
      return Err(AppError::NotFound(format!("Order {} not found", order_id)));
    }
    Ok(())
  }
}

#[async_trait]
impl LicenseRepository for PgStore {
  async fn create_license(&self, new_license: NewLicense) -> AppResult<License> {
    let sql = format!(
      "INSERT INTO licenses (id, product_id, user_id, license_key, is_active, expiry_date) \
       VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
      LICENSE_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, License>(&sql)
        .bind(Uuid::new_v4())
        .bind(new_license.product_id)
        .bind(new_license.user_id)
        .bind(&new_license.license_key)
        .bind(new_license.is_active)
        .bind(new_license.expiry_date)
        .fetch_one(&self.pool)
        .await?,
    )
  }

  async fn list_licenses_for_user(&self, user_id: Uuid) -> AppResult<Vec<License>> {
    let sql = format!(
      "SELECT {} FROM licenses WHERE user_id = $1 ORDER BY created_at DESC",
      LICENSE_COLUMNS
    );
    Ok(sqlx::query_as::<_, License>(&sql).bind(user_id).fetch_all(&self.pool).await?)
  }
}

#[async_trait]
impl ProductCatalog for PgStore {
  async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
    Ok(
      sqlx::query_as::<_, Product>(
        "SELECT id, name, description, price, created_at, updated_at FROM products WHERE id = ANY($1)",
      )
      .bind(ids)
      .fetch_all(&self.pool)
      .await?,
    )
  }
}

#[async_trait]
impl CartCollaborator for PgStore {
  async fn clear_cart(&self, user_id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}
