// storefront/src/services/reconciler.rs

//! Processor code to order status. Pure and total: unknown or missing codes are `Pending`.

use crate::errors::{AppError, Result as AppResult};
use crate::models::PaymentStatus;
use tracing::warn;

pub const STATUS_TABLE: [(&str, PaymentStatus); 8] = [
  ("APRO", PaymentStatus::Approved),
  ("OTHE", PaymentStatus::Rejected),
  ("CONT", PaymentStatus::Pending),
  ("CALL", PaymentStatus::PendingReview),
  ("FUND", PaymentStatus::Rejected),
  ("SECU", PaymentStatus::Rejected),
  ("EXPI", PaymentStatus::Rejected),
  ("FORM", PaymentStatus::Rejected),
];

/// Strict lookup: fails with `AppError::Reconciliation` for a missing or unknown code.
pub fn try_reconcile(code: Option<&str>) -> AppResult<PaymentStatus> {
  let code = code.ok_or_else(|| AppError::Reconciliation("processor response carried no status code".to_string()))?;
  STATUS_TABLE
    .iter()
    .find(|(known, _)| *known == code)
    .map(|(_, status)| *status)
    .ok_or_else(|| AppError::Reconciliation(format!("unrecognized processor code '{}'", code)))
}

/// Lookup with the conservative fallback. Never yields `Approved` for an unknown code.
pub fn reconcile(code: Option<&str>) -> PaymentStatus {
  match try_reconcile(code) {
    Ok(status) => status,
    Err(e) => {
      warn!(processor_code = ?code, error = %e, "Treating payment as pending.");
      PaymentStatus::Pending
    }
  }
}
