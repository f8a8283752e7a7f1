// storefront/src/pipelines/reconcile_pipeline.rs

//! Re-checks one order against the gateway and advances it out of `pending`.
//! Safe to run any number of times: settled orders and orders without a payment id stop
//! at `load_order`, and licenses follow only the run that wins the move into `approved`.

use crate::errors::AppError;
use crate::models::PaymentStatus;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::ReconcileCtxData;
use crate::services::reconciler;
use licenseshop_flow::{ContextData, FlowRegistry, Pipeline, StepControl, StepDef};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn transitioned_to_approved(ctx: &ContextData<ReconcileCtxData>) -> bool {
  ctx.with_read(|c| c.transitioned && c.new_status == Some(PaymentStatus::Approved))
}

pub fn reconcile_pipeline() -> Pipeline<ReconcileCtxData, AppError> {
  let mut p = Pipeline::<ReconcileCtxData, AppError>::new(vec![
    StepDef::required("load_order"),
    StepDef::required("query_gateway_status"),
    StepDef::required("apply_reconciled_status"),
    StepDef::optional("provision_entitlements")
      .skip_if(|ctx: ContextData<ReconcileCtxData>| !transitioned_to_approved(&ctx)),
    StepDef::optional("dispatch_confirmation")
      .skip_if(|ctx: ContextData<ReconcileCtxData>| !transitioned_to_approved(&ctx)),
  ]);

  p.on_root("load_order", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let (orders, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.orders.clone(), guard.order_id)
      };
      let order = orders
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

      let status = order.payment_status;
      let has_payment_id = order.payment_id().is_some();
      {
        let mut guard = ctx_data.write();
        guard.previous_status = Some(status);
        guard.order = Some(order);
      }
      if status.is_terminal() {
        info!(%order_id, %status, "Order already settled; nothing to reconcile.");
        return Ok::<_, AppError>(StepControl::Stop);
      }
      if !has_payment_id {
        warn!(%order_id, "Order has no processor payment id; cannot query the gateway.");
        return Ok(StepControl::Stop);
      }
      Ok(StepControl::Continue)
    })
  });

  p.on_root("query_gateway_status", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let (gateway, order_id, payment_id, timeout_secs) = {
        let guard = ctx_data.read();
        let payment_id = guard
          .order
          .as_ref()
          .and_then(|o| o.payment_id())
          .map(str::to_string)
          .ok_or_else(|| AppError::Internal("reconciliation context lost the payment id".to_string()))?;
        (
          guard.app_state.gateway.clone(),
          guard.order_id,
          payment_id,
          guard.app_state.config.payment_gateway_timeout_secs,
        )
      };

      let payment = tokio::time::timeout(Duration::from_secs(timeout_secs), gateway.payment_status(&payment_id))
        .await
        .map_err(|_| AppError::gateway(Some(order_id), format!("gateway did not answer within {}s", timeout_secs)))?
        .map_err(|e| match e {
          AppError::PaymentGateway { message, .. } => AppError::gateway(Some(order_id), message),
          other => other,
        })?;
      info!(%order_id, %payment_id, processor_code = ?payment.processor_code, "Gateway status fetched.");
      ctx_data.write().gateway_payment = Some(payment);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("apply_reconciled_status", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let (orders, order_id, previous, code) = {
        let guard = ctx_data.read();
        (
          guard.app_state.orders.clone(),
          guard.order_id,
          guard.previous_status.unwrap_or(PaymentStatus::Pending),
          guard.gateway_payment.as_ref().and_then(|p| p.processor_code.clone()),
        )
      };

      let status = reconciler::reconcile(code.as_deref());
      ctx_data.write().new_status = Some(status);
      if status == previous {
        info!(%order_id, %status, "Gateway reports no change.");
        return Ok::<_, AppError>(StepControl::Stop);
      }

      match orders.transition_payment_status(order_id, &[previous], status, None).await? {
        Some(order) => {
          info!(%order_id, from = %previous, to = %status, "Order status advanced.");
          let mut guard = ctx_data.write();
          guard.order = Some(order);
          guard.transitioned = true;
          Ok(StepControl::Continue)
        }
        None => {
          info!(%order_id, "Order changed concurrently; leaving it to the other run.");
          Ok(StepControl::Stop)
        }
      }
    })
  });

  p.on_root("provision_entitlements", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let (app_state, order) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard
            .order
            .clone()
            .ok_or_else(|| AppError::Internal("reconciliation context lost the order".to_string()))?,
        )
      };
      let report = common_steps::provision_order_entitlements(&app_state, &order, PaymentStatus::Approved, None).await?;
      ctx_data.write().provisioning = Some(report);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("dispatch_confirmation", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let (notifier, confirmation) = {
        let guard = ctx_data.read();
        let order = guard
          .order
          .as_ref()
          .ok_or_else(|| AppError::Internal("reconciliation context lost the order".to_string()))?;
        let issued = guard.provisioning.as_ref().map_or(0, |r| r.issued.len());
        (
          guard.app_state.notifier.clone(),
          common_steps::confirmation_for(order, PaymentStatus::Approved, issued),
        )
      };
      common_steps::dispatch_order_confirmation(notifier, confirmation);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p
}

pub fn register_reconcile_pipeline(registry: &Arc<FlowRegistry<AppError>>) {
  registry.register_pipeline(reconcile_pipeline());
  info!("Reconciliation pipeline registered.");
}
