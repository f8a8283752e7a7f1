// storefront/src/models/billing.rs

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Billing snapshot stored on the order. Shipping reuses it, licenses are delivered digitally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub city: Option<String>,
  #[serde(default)]
  pub state: Option<String>,
  #[serde(default)]
  pub zip_code: Option<String>,
  #[serde(default)]
  pub country: Option<String>,
  /// Taxpayer document (CPF/CNPJ), digits only or formatted.
  #[serde(default)]
  pub document_number: Option<String>,
}

impl BillingAddress {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name.trim(), self.last_name.trim()).trim().to_string()
  }
}

/// The authenticated buyer together with the billing snapshot submitted at checkout.
#[derive(Debug, Clone)]
pub struct BillingInfo {
  pub user_id: Uuid,
  pub email_verified: bool,
  pub address: BillingAddress,
}

impl BillingInfo {
  pub fn validate(&self) -> Result<()> {
    if self.user_id.is_nil() {
      return Err(AppError::Validation("A valid user id is required.".to_string()));
    }
    if !self.email_verified {
      return Err(AppError::Validation(
        "Please verify your email address before checking out.".to_string(),
      ));
    }
    if !is_plausible_email(&self.address.email) {
      return Err(AppError::Validation(format!(
        "Invalid billing email '{}'.",
        self.address.email
      )));
    }
    if self.address.first_name.trim().is_empty() || self.address.last_name.trim().is_empty() {
      return Err(AppError::Validation("Billing first and last name are required.".to_string()));
    }
    Ok(())
  }
}

fn is_plausible_email(email: &str) -> bool {
  match email.trim().split_once('@') {
    Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
    None => false,
  }
}
