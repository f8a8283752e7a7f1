// storefront/src/models/license.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct License {
  pub id: Uuid,
  pub product_id: Uuid,
  pub user_id: Uuid,
  pub license_key: String,
  pub is_active: bool,
  /// `None` means perpetual.
  pub expiry_date: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLicense {
  pub product_id: Uuid,
  pub user_id: Uuid,
  pub license_key: String,
  pub is_active: bool,
  pub expiry_date: Option<DateTime<Utc>>,
}
