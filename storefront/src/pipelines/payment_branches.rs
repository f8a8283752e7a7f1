// storefront/src/pipelines/payment_branches.rs

//! Sub-pipelines run by the checkout's `charge_payment` step, one per payment rail.
//! Each submits exactly one charge; neither retries.

use crate::errors::AppError;
use crate::pipelines::contexts::ChargeSubCtxData;
use licenseshop_flow::{ContextData, Pipeline, StepControl, StepDef};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Sends the prepared charge, bounded by the sub-context's timeout. A timeout is a gateway
/// error: the charge may still have gone through, so nothing is marked failed.
#[instrument(name = "charge::submit", skip(sub_ctx), fields(order_id, method), err(Display))]
async fn submit_charge(sub_ctx: ContextData<ChargeSubCtxData>) -> Result<StepControl, AppError> {
  let (gateway, request, timeout_secs) = {
    let guard = sub_ctx.read();
    (guard.gateway.clone(), guard.request.clone(), guard.timeout_secs)
  };
  let order_id = request.order_id;
  tracing::Span::current().record("order_id", tracing::field::display(order_id));
  tracing::Span::current().record("method", request.kind().as_str());

  let payment = match tokio::time::timeout(Duration::from_secs(timeout_secs), gateway.create_payment(&request)).await {
    Ok(Ok(payment)) => payment,
    Ok(Err(AppError::PaymentGateway { order_id: None, message })) => {
      return Err(AppError::gateway(Some(order_id), message));
    }
    Ok(Err(e)) => return Err(e),
    Err(_) => {
      warn!(%order_id, timeout_secs, "Gateway did not answer in time; order stays pending.");
      return Err(AppError::gateway(
        Some(order_id),
        format!("gateway did not answer within {}s", timeout_secs),
      ));
    }
  };

  info!(
    %order_id,
    payment_id = ?payment.payment_id,
    processor_code = ?payment.processor_code,
    "Charge submitted."
  );
  sub_ctx.write().payment = Some(payment);
  Ok(StepControl::Continue)
}

pub fn card_charge_pipeline() -> Arc<Pipeline<ChargeSubCtxData, AppError>> {
  let mut p = Pipeline::<ChargeSubCtxData, AppError>::new(vec![
    StepDef::required("submit_card_charge"),
    StepDef::optional("check_card_response"),
  ]);

  p.on_root("submit_card_charge", submit_charge);

  p.on_root("check_card_response", |sub_ctx: ContextData<ChargeSubCtxData>| {
    Box::pin(async move {
      let guard = sub_ctx.read();
      let order_id = guard.request.order_id;
      match &guard.payment {
        Some(payment) if payment.payment_id.is_some() => {}
        Some(_) => warn!(%order_id, "Card charge answered without a payment id; it cannot be re-checked later."),
        None => warn!(%order_id, "Card charge produced no payment."),
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  Arc::new(p)
}

pub fn pix_charge_pipeline() -> Arc<Pipeline<ChargeSubCtxData, AppError>> {
  let mut p = Pipeline::<ChargeSubCtxData, AppError>::new(vec![
    StepDef::required("submit_pix_charge"),
    StepDef::optional("check_pix_instructions"),
  ]);

  p.on_root("submit_pix_charge", submit_charge);

  p.on_root("check_pix_instructions", |sub_ctx: ContextData<ChargeSubCtxData>| {
    Box::pin(async move {
      let guard = sub_ctx.read();
      let order_id = guard.request.order_id;
      let has_qr = guard.payment.as_ref().and_then(|p| p.pix.as_ref()).is_some();
      if !has_qr {
        warn!(%order_id, "PIX charge answered without QR code data.");
      }
      Ok::<_, AppError>(StepControl::Continue)
    })
  });

  Arc::new(p)
}
