// storefront/src/services/notifier.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::PaymentStatus;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OrderConfirmation {
  pub order_id: Uuid,
  pub recipient_email: String,
  pub recipient_name: String,
  pub total: Decimal,
  pub status: PaymentStatus,
  pub licenses_issued: usize,
}

impl OrderConfirmation {
  pub fn subject(&self) -> String {
    match self.status {
      PaymentStatus::Approved => format!("Your order {} is confirmed", self.order_id),
      _ => format!("We received your order {}", self.order_id),
    }
  }
}

#[derive(Debug, Clone)]
pub struct SentNotification {
  pub to: String,
  pub subject: String,
  pub message_id: String,
}

/// Outbound buyer notifications. Callers never wait on or fail because of these.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> AppResult<SentNotification>;
}

/// Writes the notification to the log instead of delivering it.
pub struct LogNotifier {
  sender: String,
}

impl LogNotifier {
  pub fn new(sender: impl Into<String>) -> Self {
    Self { sender: sender.into() }
  }
}

#[async_trait]
impl Notifier for LogNotifier {
  async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> AppResult<SentNotification> {
    let subject = confirmation.subject();
    if confirmation.recipient_email.trim().is_empty() {
      warn!(order_id = %confirmation.order_id, "No recipient for order confirmation.");
      return Err(AppError::Validation("missing recipient".to_string()));
    }
    let message_id = format!("log_notification_{}", Uuid::new_v4());
    info!(
      to = %confirmation.recipient_email,
      from = %self.sender,
      %subject,
      total = %confirmation.total,
      licenses = confirmation.licenses_issued,
      %message_id,
      "Order confirmation logged."
    );
    Ok(SentNotification {
      to: confirmation.recipient_email.clone(),
      subject,
      message_id,
    })
  }
}
