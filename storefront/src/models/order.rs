// storefront/src/models/order.rs

use crate::errors::AppError;
use crate::models::billing::BillingAddress;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Payment lifecycle of an order. Every order starts as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  Pending,
  Approved,
  Rejected,
  PendingReview,
}

impl PaymentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Approved => "approved",
      PaymentStatus::Rejected => "rejected",
      PaymentStatus::PendingReview => "pending_review",
    }
  }

  /// Only an approved payment authorizes license issuance.
  pub fn is_success_eligible(&self) -> bool {
    matches!(self, PaymentStatus::Approved)
  }

  /// `Approved` and `Rejected` are final; the others may still advance through reconciliation.
  pub fn is_terminal(&self) -> bool {
    matches!(self, PaymentStatus::Approved | PaymentStatus::Rejected)
  }

  pub fn awaits_confirmation(&self) -> bool {
    matches!(self, PaymentStatus::Pending | PaymentStatus::PendingReview)
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentStatus {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(PaymentStatus::Pending),
      "approved" => Ok(PaymentStatus::Approved),
      "rejected" => Ok(PaymentStatus::Rejected),
      "pending_review" => Ok(PaymentStatus::PendingReview),
      other => Err(AppError::Validation(format!("Unknown payment status '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub total: Decimal,
  pub billing_address: Json<BillingAddress>,
  pub shipping_address: Json<BillingAddress>,
  pub payment_status: PaymentStatus,
  /// Holds the processor's payment id once a charge was answered.
  pub invoice_url: Option<String>,
  pub external_id: Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Last time the sweep asked the processor about this order.
  pub last_reconciled_at: Option<DateTime<Utc>>,
}

impl Order {
  pub fn payment_id(&self) -> Option<&str> {
    self.invoice_url.as_deref().filter(|id| !id.is_empty())
  }
}

/// Fields supplied when creating an order. The store assigns `id`, the timestamps and
/// the initial `Pending` status.
#[derive(Debug, Clone)]
pub struct NewOrder {
  pub user_id: Uuid,
  pub total: Decimal,
  pub billing_address: BillingAddress,
  pub shipping_address: BillingAddress,
  pub external_id: Uuid,
}
