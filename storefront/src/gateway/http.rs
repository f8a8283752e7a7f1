// storefront/src/gateway/http.rs

//! `PaymentGateway` over the gateway's action-verb HTTP endpoint: every call is a
//! `POST {"action": ..., "data": {...}}` to one URL.

use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::gateway::normalize::normalize_payment;
use crate::gateway::types::{ChargeRequest, GatewayPayment, PreferenceRequest};
use crate::gateway::PaymentGateway;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
  client: reqwest::Client,
  endpoint: String,
  token: Option<String>,
}

impl HttpPaymentGateway {
  pub fn new(endpoint: impl Into<String>, token: Option<String>, timeout: Duration) -> AppResult<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Could not build payment gateway client: {}", e)))?;
    Ok(Self {
      client,
      endpoint: endpoint.into(),
      token,
    })
  }

  pub fn from_config(config: &AppConfig) -> AppResult<Self> {
    Self::new(
      config.payment_gateway_url.clone(),
      config.payment_gateway_token.clone(),
      Duration::from_secs(config.payment_gateway_timeout_secs),
    )
  }

  async fn call(&self, action: &str, data: Value, order_id: Option<Uuid>) -> AppResult<Value> {
    let mut request = self
      .client
      .post(&self.endpoint)
      .json(&json!({ "action": action, "data": data }));
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(|e| {
      warn!(action, error = %e, "Payment gateway request failed.");
      AppError::gateway(order_id, e.to_string())
    })?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| AppError::gateway(order_id, format!("unreadable gateway response: {}", e)))?;

    if !status.is_success() {
      let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
      warn!(action, http_status = %status, %message, "Payment gateway rejected the call.");
      return Err(AppError::gateway(order_id, message));
    }

    serde_json::from_str(&body).map_err(|e| AppError::gateway(order_id, format!("gateway response is not JSON: {}", e)))
  }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
  #[instrument(name = "gateway::create_payment", skip(self, request), fields(order_id = %request.order_id, method = %request.kind().as_str()), err(Display))]
  async fn create_payment(&self, request: &ChargeRequest) -> AppResult<GatewayPayment> {
    let data = request.to_action_data()?;
    let body = self.call("create_payment", data, Some(request.order_id)).await?;
    let payment = normalize_payment(&body);
    info!(
      payment_id = ?payment.payment_id,
      processor_code = ?payment.processor_code,
      "Gateway answered create_payment."
    );
    Ok(payment)
  }

  #[instrument(name = "gateway::payment_methods", skip(self), err(Display))]
  async fn payment_methods(&self) -> AppResult<Value> {
    self.call("get_payment_methods", json!({}), None).await
  }

  #[instrument(name = "gateway::payment_status", skip(self), err(Display))]
  async fn payment_status(&self, payment_id: &str) -> AppResult<GatewayPayment> {
    let body = self
      .call("get_payment_status", json!({ "paymentId": payment_id }), None)
      .await?;
    Ok(normalize_payment(&body))
  }

  #[instrument(name = "gateway::create_preference", skip(self, request), fields(external_reference = %request.external_reference), err(Display))]
  async fn create_preference(&self, request: &PreferenceRequest) -> AppResult<Value> {
    let data = request.to_action_data()?;
    // Redirect checkouts persist no order, so errors carry no order id.
    self.call("create_preference", data, None).await
  }
}
