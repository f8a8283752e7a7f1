// storefront/src/pipelines/checkout_pipeline.rs

//! One checkout attempt as a named-step state machine. Each step commits on its own; the
//! order row's `payment_status` records how far the attempt got.

use crate::errors::AppError;
use crate::gateway::ChargeRequest;
use crate::models::{NewOrder, OrderItem, PaymentStatus};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{ActiveCharge, ChargeSubCtxData, CheckoutCtxData};
use crate::pipelines::payment_branches::{card_charge_pipeline, pix_charge_pipeline};
use crate::services::reconciler;
use licenseshop_flow::{ContextData, FlowError, FlowRegistry, NoBranchMatch, Pipeline, StepControl, StepDef};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

fn not_rejected(ctx: &ContextData<CheckoutCtxData>) -> bool {
  ctx
    .read()
    .reconciled_status
    .map_or(false, |status| status != PaymentStatus::Rejected)
}

fn missing(what: &str) -> AppError {
  AppError::Internal(format!("checkout context is missing {}", what))
}

pub fn checkout_pipeline() -> Pipeline<CheckoutCtxData, AppError> {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(vec![
    StepDef::required("validate_checkout"),
    StepDef::required("issue_idempotency_token"),
    StepDef::required("create_order_record"),
    StepDef::required("create_order_items"),
    StepDef::required("prepare_charge"),
    StepDef::required("charge_payment"),
    StepDef::required("reconcile_payment_status"),
    StepDef::optional("provision_entitlements").skip_if(|ctx: ContextData<CheckoutCtxData>| {
      let guard = ctx.read();
      !(guard.transitioned && guard.reconciled_status.map_or(false, |s| s.is_success_eligible()))
    }),
    StepDef::optional("clear_cart").skip_if(|ctx: ContextData<CheckoutCtxData>| !not_rejected(&ctx)),
    StepDef::optional("dispatch_confirmation").skip_if(|ctx: ContextData<CheckoutCtxData>| !not_rejected(&ctx)),
  ]);

  // Everything the buyer can fix is rejected here, before anything is written.
  p.on_root("validate_checkout", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let validated = {
        let guard = ctx_data.read();
        guard.cart.validate()?;
        guard.billing.validate()?;
        guard.selection.validate(
          guard.billing.address.document_number.as_deref(),
          guard.app_state.config.max_installments,
        )?
      };
      info!(method = validated.method.kind().as_str(), "Checkout input validated.");
      ctx_data.write().validated_payment = Some(validated);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("issue_idempotency_token", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let token = Uuid::new_v4();
      ctx_data.write().external_id = Some(token);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("create_order_record", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (orders, new_order) = {
        let guard = ctx_data.read();
        let new_order = NewOrder {
          user_id: guard.billing.user_id,
          total: guard.cart.total(),
          billing_address: guard.billing.address.clone(),
          shipping_address: guard.billing.address.clone(),
          external_id: guard.external_id.ok_or_else(|| missing("an idempotency token"))?,
        };
        (guard.app_state.orders.clone(), new_order)
      };

      let order = orders.create_order(new_order).await.map_err(|e| {
        error!(error = %e, "Order could not be persisted; no charge attempted.");
        AppError::persistence(None, e)
      })?;
      info!(order_id = %order.id, total = %order.total, external_id = %order.external_id, "Order created as pending.");
      ctx_data.write().order = Some(order);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("create_order_items", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (orders, order_id, order_total, new_items) = {
        let guard = ctx_data.read();
        let order = guard.order.as_ref().ok_or_else(|| missing("the order"))?;
        (guard.app_state.orders.clone(), order.id, order.total, guard.cart.to_order_items())
      };

      // On failure the order is left pending without items; no compensating delete.
      let created = orders.create_order_items(order_id, &new_items).await.map_err(|e| {
        error!(%order_id, error = %e, "Order items could not be persisted; order stays pending.");
        AppError::persistence(Some(order_id), e)
      })?;

      let items_total: Decimal = created.iter().map(OrderItem::line_total).sum();
      if items_total != order_total {
        error!(%order_id, %items_total, %order_total, "Order total differs from its items.");
      }
      ctx_data.write().order_items = created;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("prepare_charge", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let order = guard.order.as_ref().ok_or_else(|| missing("the order"))?;
      let payment = guard.validated_payment.clone().ok_or_else(|| missing("a validated payment"))?;
      let request = ChargeRequest {
        order_id: order.id,
        amount: order.total,
        payer_email: guard.billing.address.email.clone(),
        payment,
      };
      let is_card = request.kind().is_card();
      let sub_ctx = ContextData::new(ChargeSubCtxData {
        gateway: guard.app_state.gateway.clone(),
        request,
        timeout_secs: guard.app_state.config.payment_gateway_timeout_secs,
        payment: None,
      });
      guard.charge = if is_card {
        ActiveCharge::Card(sub_ctx)
      } else {
        ActiveCharge::Pix(sub_ctx)
      };
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.branch_step("charge_payment")
    .add_branch(
      "card",
      card_charge_pipeline(),
      |ctx_data: ContextData<CheckoutCtxData>| {
        let guard = ctx_data.read();
        match &guard.charge {
          ActiveCharge::Card(sub_ctx) => Ok(sub_ctx.clone()),
          _ => Err(FlowError::ExtractorFailure {
            step_name: "charge_payment".to_string(),
            source: anyhow::anyhow!("card charge was not prepared"),
          }),
        }
      },
    )
    .when(|ctx_data: ContextData<CheckoutCtxData>| ctx_data.with_read(|c| matches!(c.charge, ActiveCharge::Card(_))))
    .add_branch(
      "pix",
      pix_charge_pipeline(),
      |ctx_data: ContextData<CheckoutCtxData>| {
        let guard = ctx_data.read();
        match &guard.charge {
          ActiveCharge::Pix(sub_ctx) => Ok(sub_ctx.clone()),
          _ => Err(FlowError::ExtractorFailure {
            step_name: "charge_payment".to_string(),
            source: anyhow::anyhow!("PIX charge was not prepared"),
          }),
        }
      },
    )
    .when(|ctx_data: ContextData<CheckoutCtxData>| ctx_data.with_read(|c| matches!(c.charge, ActiveCharge::Pix(_))))
    .if_no_branch_matches(NoBranchMatch::Fail)
    .finalize();

  p.after_root("charge_payment", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      guard.gateway_payment = guard.charge.payment();
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("reconcile_payment_status", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (orders, order_id, payment) = {
        let guard = ctx_data.read();
        (
          guard.app_state.orders.clone(),
          guard.order_id().ok_or_else(|| missing("the order"))?,
          guard.gateway_payment.clone().unwrap_or_default(),
        )
      };

      let status = reconciler::reconcile(payment.processor_code.as_deref());
      let transitioned = orders
        .transition_payment_status(order_id, &[PaymentStatus::Pending], status, payment.payment_id.as_deref())
        .await
        .map_err(|e| {
          error!(%order_id, payment_id = ?payment.payment_id, %status, error = %e, "Reconciled status could not be saved.");
          AppError::persistence(Some(order_id), e)
        })?;

      let (order, moved) = match transitioned {
        Some(order) => (order, true),
        None => {
          // Another reconciliation got there first; report what it recorded.
          let current = orders
            .find_order(order_id)
            .await
            .map_err(|e| AppError::persistence(Some(order_id), e))?
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
          warn!(%order_id, current = %current.payment_status, "Order already left pending.");
          (current, false)
        }
      };

      info!(%order_id, status = %order.payment_status, payment_id = ?order.invoice_url, "Payment status reconciled.");
      let mut guard = ctx_data.write();
      guard.reconciled_status = Some(order.payment_status);
      guard.transitioned = moved;
      guard.order = Some(order);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("provision_entitlements", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, order, status, items) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard.order.clone().ok_or_else(|| missing("the order"))?,
          guard.reconciled_status.ok_or_else(|| missing("a reconciled status"))?,
          guard.order_items.clone(),
        )
      };
      let report = common_steps::provision_order_entitlements(&app_state, &order, status, Some(items)).await?;
      ctx_data.write().provisioning = Some(report);
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("clear_cart", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (cart, user_id) = {
        let guard = ctx_data.read();
        (guard.app_state.cart.clone(), guard.billing.user_id)
      };
      cart.clear_cart(user_id).await?;
      ctx_data.write().cart_cleared = true;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p.on_root("dispatch_confirmation", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (notifier, confirmation) = {
        let guard = ctx_data.read();
        let order = guard.order.as_ref().ok_or_else(|| missing("the order"))?;
        let status = guard.reconciled_status.ok_or_else(|| missing("a reconciled status"))?;
        let issued = guard.provisioning.as_ref().map_or(0, |r| r.issued.len());
        (
          guard.app_state.notifier.clone(),
          common_steps::confirmation_for(order, status, issued),
        )
      };
      common_steps::dispatch_order_confirmation(notifier, confirmation);
      ctx_data.write().notification_dispatched = true;
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  p
}

pub fn register_checkout_pipeline(registry: &Arc<FlowRegistry<AppError>>) {
  registry.register_pipeline(checkout_pipeline());
  info!("Checkout pipeline registered.");
}
