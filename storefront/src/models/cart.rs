// storefront/src/models/cart.rs

use crate::errors::{AppError, Result};
use crate::models::order_item::NewOrderItem;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
  pub product_id: Uuid,
  pub product_name: String,
  pub unit_price: Decimal,
  pub quantity: i32,
}

impl CartLine {
  pub fn line_total(&self) -> Decimal {
    self.unit_price * Decimal::from(self.quantity)
  }
}

/// Immutable view of the cart at the moment checkout started.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartSnapshot {
  lines: Vec<CartLine>,
  total: Decimal,
}

impl CartSnapshot {
  pub fn new(lines: Vec<CartLine>) -> Self {
    let total = lines.iter().map(CartLine::line_total).sum();
    Self { lines, total }
  }

  pub fn empty() -> Self {
    Self::new(Vec::new())
  }

  pub fn lines(&self) -> &[CartLine] {
    &self.lines
  }

  pub fn total(&self) -> Decimal {
    self.total
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  /// Checks the preconditions of a checkout: at least one line, positive quantities and prices.
  pub fn validate(&self) -> Result<()> {
    if self.is_empty() {
      return Err(AppError::EmptyCart);
    }
    for line in &self.lines {
      if line.quantity <= 0 {
        return Err(AppError::Validation(format!(
          "Quantity for '{}' must be positive.",
          line.product_name
        )));
      }
      if line.unit_price <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
          "Product '{}' has no valid price.",
          line.product_name
        )));
      }
    }
    Ok(())
  }

  /// One order item per cart line, with the price captured now.
  pub fn to_order_items(&self) -> Vec<NewOrderItem> {
    self
      .lines
      .iter()
      .map(|line| NewOrderItem {
        product_id: line.product_id,
        quantity: line.quantity,
        price: line.unit_price,
      })
      .collect()
  }
}
