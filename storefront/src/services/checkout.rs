// storefront/src/services/checkout.rs

use crate::errors::{AppError, Result as AppResult};
use crate::gateway::{PaymentSelection, PixInstructions, PreferenceRequest};
use crate::models::{BillingAddress, BillingInfo, CartLine, CartSnapshot, License, PaymentStatus};
use crate::pipelines::contexts::CheckoutCtxData;
use crate::services::entitlements::ProvisioningFailure;
use crate::state::AppState;
use crate::store::ProductCatalog;
use licenseshop_flow::{ContextData, PipelineOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
  pub product_id: Uuid,
  pub quantity: i32,
}

/// Prices every requested line from the catalog. Unknown products are a validation error.
pub async fn resolve_cart(catalog: &dyn ProductCatalog, requested: &[CartLineRequest]) -> AppResult<CartSnapshot> {
  if requested.is_empty() {
    return Err(AppError::EmptyCart);
  }
  let mut ids: Vec<Uuid> = requested.iter().map(|l| l.product_id).collect();
  ids.sort();
  ids.dedup();
  let products: HashMap<Uuid, _> = catalog
    .find_products(&ids)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

  let mut lines = Vec::with_capacity(requested.len());
  for line in requested {
    let product = products
      .get(&line.product_id)
      .ok_or_else(|| AppError::Validation(format!("Product {} is not available.", line.product_id)))?;
    lines.push(CartLine {
      product_id: product.id,
      product_name: product.name.clone(),
      unit_price: product.price,
      quantity: line.quantity,
    });
  }
  let cart = CartSnapshot::new(lines);
  cart.validate()?;
  Ok(cart)
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
  pub billing: BillingInfo,
  pub cart: CartSnapshot,
  pub payment: PaymentSelection,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
  pub status: PaymentStatus,
  pub order_id: Uuid,
  pub payment_id: Option<String>,
  pub pix: Option<PixInstructions>,
  pub licenses: Vec<License>,
  pub provisioning_failures: Vec<ProvisioningFailure>,
}

/// Drives checkout attempts through the registered checkout pipeline.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
  state: AppState,
}

impl CheckoutOrchestrator {
  pub fn new(state: AppState) -> Self {
    Self { state }
  }

  /// Runs one attempt: at most one order and one charge. Failures before the order exists
  /// leave nothing behind; later failures leave the order `pending` for reconciliation.
  #[instrument(name = "checkout::run", skip(self, request), fields(user_id = %request.billing.user_id, method = request.payment.kind().as_str()), err(Display))]
  pub async fn checkout(&self, request: CheckoutRequest) -> AppResult<CheckoutOutcome> {
    let ctx = ContextData::new(CheckoutCtxData::new(
      self.state.clone(),
      request.billing,
      request.cart,
      request.payment,
    ));

    match self.state.flow.run(ctx.clone()).await? {
      PipelineOutcome::Completed => {}
      PipelineOutcome::Stopped { step } => {
        return Err(AppError::Internal(format!("checkout halted at step '{}'", step)));
      }
    }

    let guard = ctx.read();
    let order = guard
      .order
      .as_ref()
      .ok_or_else(|| AppError::Internal("checkout finished without an order".to_string()))?;
    let status = guard.reconciled_status.unwrap_or(order.payment_status);
    let (licenses, provisioning_failures) = match &guard.provisioning {
      Some(report) => (report.issued.clone(), report.failures.clone()),
      None => (Vec::new(), Vec::new()),
    };
    let outcome = CheckoutOutcome {
      status,
      order_id: order.id,
      payment_id: order.invoice_url.clone(),
      pix: guard.gateway_payment.as_ref().and_then(|p| p.pix.clone()),
      licenses,
      provisioning_failures,
    };
    info!(order_id = %outcome.order_id, status = %outcome.status, licenses = outcome.licenses.len(), "Checkout finished.");
    Ok(outcome)
  }

  /// Redirect-style checkout: asks the gateway for a hosted payment page. Nothing is persisted.
  #[instrument(name = "checkout::preference", skip(self, cart, payer), err(Display))]
  pub async fn create_preference(&self, cart: CartSnapshot, payer: BillingAddress) -> AppResult<Value> {
    cart.validate()?;
    let config = &self.state.config;
    let request = PreferenceRequest {
      external_reference: Uuid::new_v4(),
      cart,
      payer,
      base_url: config.app_base_url.clone(),
      currency_id: config.currency_id.clone(),
      statement_descriptor: config.statement_descriptor.clone(),
      max_installments: config.max_installments,
      excluded_payment_types: Vec::new(),
    };
    self.state.gateway.create_preference(&request).await
  }
}
