// storefront/src/pipelines/contexts.rs

//! Data carried through the pipelines. Handlers receive these wrapped in `ContextData`.

use crate::gateway::{ChargeRequest, GatewayPayment, PaymentGateway, PaymentSelection, ValidatedPayment};
use crate::models::{BillingInfo, CartSnapshot, Order, OrderItem, PaymentStatus};
use crate::services::entitlements::ProvisioningReport;
use crate::state::AppState;
use licenseshop_flow::ContextData;
use std::sync::Arc;
use uuid::Uuid;

/// Sub-context of the charge step; one per charge, shared by the card and PIX branches.
#[derive(Clone)]
pub struct ChargeSubCtxData {
  pub gateway: Arc<dyn PaymentGateway>,
  pub request: ChargeRequest,
  pub timeout_secs: u64,
  pub payment: Option<GatewayPayment>,
}

#[derive(Clone)]
pub enum ActiveCharge {
  None,
  Card(ContextData<ChargeSubCtxData>),
  Pix(ContextData<ChargeSubCtxData>),
}

impl ActiveCharge {
  pub fn payment(&self) -> Option<GatewayPayment> {
    match self {
      ActiveCharge::Card(sub) | ActiveCharge::Pix(sub) => sub.read().payment.clone(),
      ActiveCharge::None => None,
    }
  }
}

/// One checkout attempt, from validated input to reconciled order.
#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub billing: BillingInfo,
  pub cart: CartSnapshot,
  pub selection: PaymentSelection,

  pub validated_payment: Option<ValidatedPayment>,
  pub external_id: Option<Uuid>,
  pub order: Option<Order>,
  pub order_items: Vec<OrderItem>,
  pub charge: ActiveCharge,
  pub gateway_payment: Option<GatewayPayment>,
  pub reconciled_status: Option<PaymentStatus>,
  /// Set when this attempt performed the move out of `Pending`.
  pub transitioned: bool,
  pub provisioning: Option<ProvisioningReport>,
  pub cart_cleared: bool,
  pub notification_dispatched: bool,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, billing: BillingInfo, cart: CartSnapshot, selection: PaymentSelection) -> Self {
    Self {
      app_state,
      billing,
      cart,
      selection,
      validated_payment: None,
      external_id: None,
      order: None,
      order_items: Vec::new(),
      charge: ActiveCharge::None,
      gateway_payment: None,
      reconciled_status: None,
      transitioned: false,
      provisioning: None,
      cart_cleared: false,
      notification_dispatched: false,
    }
  }

  pub fn order_id(&self) -> Option<Uuid> {
    self.order.as_ref().map(|o| o.id)
  }
}

/// Re-check of one order against the gateway.
#[derive(Clone)]
pub struct ReconcileCtxData {
  pub app_state: AppState,
  pub order_id: Uuid,
  pub order: Option<Order>,
  pub gateway_payment: Option<GatewayPayment>,
  pub previous_status: Option<PaymentStatus>,
  pub new_status: Option<PaymentStatus>,
  pub transitioned: bool,
  pub provisioning: Option<ProvisioningReport>,
}

impl ReconcileCtxData {
  pub fn new(app_state: AppState, order_id: Uuid) -> Self {
    Self {
      app_state,
      order_id,
      order: None,
      gateway_payment: None,
      previous_status: None,
      new_status: None,
      transitioned: false,
      provisioning: None,
    }
  }
}
