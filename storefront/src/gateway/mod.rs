// storefront/src/gateway/mod.rs

//! The external payment processor as seen by the checkout.

pub mod http;
pub mod normalize;
pub mod types;

use crate::errors::Result as AppResult;
use async_trait::async_trait;
use serde_json::Value;

pub use http::HttpPaymentGateway;
pub use types::{
  ChargeMethod, ChargeRequest, GatewayPayment, PayerDocument, PaymentMethodKind, PaymentSelection, PixInstructions,
  PreferenceRequest, ValidatedPayment,
};

/// Every failure, network or HTTP, surfaces as `AppError::PaymentGateway`. Implementations never retry.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn create_payment(&self, request: &ChargeRequest) -> AppResult<GatewayPayment>;

  async fn payment_methods(&self) -> AppResult<Value>;

  async fn payment_status(&self, payment_id: &str) -> AppResult<GatewayPayment>;

  async fn create_preference(&self, request: &PreferenceRequest) -> AppResult<Value>;
}
