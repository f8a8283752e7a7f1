// storefront/src/services/reconciliation.rs

//! Out-of-band recovery for orders left `pending`: triggered by payment notifications and
//! by a periodic sweep.

use crate::errors::Result as AppResult;
use crate::models::PaymentStatus;
use crate::pipelines::contexts::ReconcileCtxData;
use crate::state::AppState;
use licenseshop_flow::{ContextData, PipelineOutcome};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Orders examined per sweep pass.
pub const SWEEP_BATCH: i64 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
  pub order_id: Uuid,
  pub previous_status: Option<PaymentStatus>,
  pub status: Option<PaymentStatus>,
  pub changed: bool,
  pub licenses_issued: usize,
  /// Step at which the run ended early, e.g. `load_order` for an already settled order.
  pub stopped_at: Option<String>,
}

#[instrument(name = "reconcile::order", skip(state), err(Display))]
pub async fn reconcile_order(state: &AppState, order_id: Uuid) -> AppResult<ReconcileReport> {
  let ctx = ContextData::new(ReconcileCtxData::new(state.clone(), order_id));
  let outcome = state.flow.run(ctx.clone()).await?;

  let guard = ctx.read();
  let report = ReconcileReport {
    order_id,
    previous_status: guard.previous_status,
    status: guard.order.as_ref().map(|o| o.payment_status),
    changed: guard.transitioned,
    licenses_issued: guard.provisioning.as_ref().map_or(0, |r| r.issued.len()),
    stopped_at: match outcome {
      PipelineOutcome::Completed => None,
      PipelineOutcome::Stopped { step } => Some(step),
    },
  };
  info!(changed = report.changed, status = ?report.status, "Reconciliation finished.");
  Ok(report)
}

/// Reconciles the order holding `payment_id`. `None` when no order references that payment.
#[instrument(name = "reconcile::payment", skip(state), err(Display))]
pub async fn reconcile_payment(state: &AppState, payment_id: &str) -> AppResult<Option<ReconcileReport>> {
  match state.orders.find_order_by_payment_id(payment_id).await? {
    Some(order) => Ok(Some(reconcile_order(state, order.id).await?)),
    None => {
      warn!("No order references this payment.");
      Ok(None)
    }
  }
}

/// One pass over unsettled orders older than the configured minimum age. Returns how many
/// orders changed status. Individual failures are logged and skipped. Every examined order
/// is stamped as checked, so orders the processor never settles rotate to the back of the
/// queue instead of starving newer ones.
#[instrument(name = "reconcile::sweep", skip(state), err(Display))]
pub async fn sweep_unsettled_orders(state: &AppState) -> AppResult<usize> {
  let min_age = chrono::Duration::seconds(state.config.reconcile_min_age_secs as i64);
  let cutoff = chrono::Utc::now() - min_age;
  let candidates = state.orders.list_unsettled_orders(cutoff, SWEEP_BATCH).await?;
  let mut changed = 0;
  for order in candidates {
    match reconcile_order(state, order.id).await {
      Ok(report) if report.changed => changed += 1,
      Ok(_) => {}
      Err(e) => warn!(order_id = %order.id, error = %e, "Reconciliation attempt failed; will retry next sweep."),
    }
    if let Err(e) = state.orders.mark_reconciled(order.id).await {
      warn!(order_id = %order.id, error = %e, "Could not record the reconciliation check.");
    }
  }
  Ok(changed)
}

/// Starts the periodic sweep, unless the interval is zero.
pub fn spawn_sweeper(state: AppState) -> Option<JoinHandle<()>> {
  let interval_secs = state.config.reconcile_interval_secs;
  if interval_secs == 0 {
    info!("Reconciliation sweeper disabled.");
    return None;
  }
  Some(tokio::spawn(async move {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match sweep_unsettled_orders(&state).await {
        Ok(0) => {}
        Ok(changed) => info!(changed, "Sweep advanced unsettled orders."),
        Err(e) => error!(error = %e, "Reconciliation sweep failed."),
      }
    }
  }))
}
