// storefront/src/pipelines/common_steps.rs

//! Follow-up work shared by the checkout and reconciliation pipelines.

use crate::errors::Result as AppResult;
use crate::models::{Order, OrderItem, PaymentStatus};
use crate::services::entitlements::ProvisioningReport;
use crate::services::notifier::{Notifier, OrderConfirmation};
use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn, Instrument};

const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Issues licenses for an order's items. When `items` is `None` they are loaded from the store.
#[instrument(name = "common_step::provision_entitlements", skip(app_state, order, items), fields(order_id = %order.id), err(Display))]
pub async fn provision_order_entitlements(
  app_state: &AppState,
  order: &Order,
  status: PaymentStatus,
  items: Option<Vec<OrderItem>>,
) -> AppResult<ProvisioningReport> {
  let items = match items {
    Some(items) => items,
    None => app_state.orders.list_order_items(order.id).await?,
  };
  let report = app_state.provisioner().provision(order.user_id, status, &items).await;
  if !report.is_complete() {
    warn!(
      failed = report.failures.len(),
      "Some licenses were not issued; the payment outcome stands."
    );
  }
  Ok(report)
}

pub fn confirmation_for(order: &Order, status: PaymentStatus, licenses_issued: usize) -> OrderConfirmation {
  OrderConfirmation {
    order_id: order.id,
    recipient_email: order.billing_address.email.clone(),
    recipient_name: order.billing_address.full_name(),
    total: order.total,
    status,
    licenses_issued,
  }
}

/// Sends the confirmation on a detached task. The caller never waits for delivery.
pub fn dispatch_order_confirmation(notifier: Arc<dyn Notifier>, confirmation: OrderConfirmation) -> JoinHandle<()> {
  let span = tracing::info_span!("common_step::order_confirmation", order_id = %confirmation.order_id);
  tokio::spawn(
    async move {
      match tokio::time::timeout(NOTIFICATION_TIMEOUT, notifier.send_order_confirmation(&confirmation)).await {
        Ok(Ok(sent)) => info!(message_id = %sent.message_id, to = %sent.to, "Order confirmation sent."),
        Ok(Err(e)) => warn!(error = %e, "Order confirmation failed."),
        Err(_) => warn!("Order confirmation timed out."),
      }
    }
    .instrument(span),
  )
}
