// storefront/src/services/entitlements.rs

use crate::errors::AppError;
use crate::models::{License, NewLicense, OrderItem, PaymentStatus};
use crate::store::LicenseRepository;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// `LICENSE-{product_id}-{timestamp_ms}-{suffix}`. Existing keys use this exact shape.
pub fn format_license_key(product_id: Uuid, issued_at: DateTime<Utc>, suffix: u32) -> String {
  format!("LICENSE-{}-{}-{}", product_id, issued_at.timestamp_millis(), suffix)
}

pub fn generate_license_key(product_id: Uuid) -> String {
  format_license_key(product_id, Utc::now(), OsRng.next_u32() % 1000)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningFailure {
  pub order_item_id: Uuid,
  pub product_id: Uuid,
  pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisioningReport {
  pub issued: Vec<License>,
  pub failures: Vec<ProvisioningFailure>,
}

impl ProvisioningReport {
  pub fn is_complete(&self) -> bool {
    self.failures.is_empty()
  }
}

#[derive(Clone)]
pub struct EntitlementProvisioner {
  licenses: Arc<dyn LicenseRepository>,
}

impl EntitlementProvisioner {
  pub fn new(licenses: Arc<dyn LicenseRepository>) -> Self {
    Self { licenses }
  }

  /// Issues one license per order item when `status` is success-eligible, nothing otherwise.
  /// Items are provisioned concurrently and independently; failures are collected, not raised.
  #[instrument(name = "entitlements::provision", skip(self, items), fields(num_items = items.len()))]
  pub async fn provision(&self, user_id: Uuid, status: PaymentStatus, items: &[OrderItem]) -> ProvisioningReport {
    if !status.is_success_eligible() {
      info!("Payment not approved; no licenses issued.");
      return ProvisioningReport::default();
    }

    let attempts = items.iter().map(|item| {
      let licenses = self.licenses.clone();
      let new_license = NewLicense {
        product_id: item.product_id,
        user_id,
        license_key: generate_license_key(item.product_id),
        is_active: status == PaymentStatus::Approved,
        expiry_date: None,
      };
      let (order_item_id, product_id) = (item.id, item.product_id);
      async move {
        licenses.create_license(new_license).await.map_err(|e| {
          let failure = AppError::EntitlementProvisioning {
            order_item_id,
            message: e.to_string(),
          };
          error!(%order_item_id, %product_id, error = %failure, "License issuance failed.");
          ProvisioningFailure {
            order_item_id,
            product_id,
            error: e.to_string(),
          }
        })
      }
    });

    let mut report = ProvisioningReport::default();
    for outcome in join_all(attempts).await {
      match outcome {
        Ok(license) => report.issued.push(license),
        Err(failure) => report.failures.push(failure),
      }
    }
    info!(
      issued = report.issued.len(),
      failed = report.failures.len(),
      "License provisioning finished."
    );
    report
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn key_has_the_legacy_shape() {
    let product_id = Uuid::parse_str("7f6c1a0e-2b9d-4a51-9d3e-1c2b3a4d5e6f").expect("uuid");
    let at = Utc.timestamp_millis_opt(1_700_000_000_123).single().expect("timestamp");
    assert_eq!(
      format_license_key(product_id, at, 42),
      "LICENSE-7f6c1a0e-2b9d-4a51-9d3e-1c2b3a4d5e6f-1700000000123-42"
    );
  }

  #[test]
  fn generated_suffix_is_below_one_thousand() {
    let product_id = Uuid::new_v4();
    for _ in 0..50 {
      let key = generate_license_key(product_id);
      let suffix: u32 = key.rsplit('-').next().and_then(|s| s.parse().ok()).expect("numeric suffix");
      assert!(suffix < 1000);
      assert!(key.starts_with(&format!("LICENSE-{}-", product_id)));
    }
  }
}
