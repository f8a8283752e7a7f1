// storefront/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use licenseshop_flow::FlowError;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Cart is empty")]
  EmptyCart,

  #[error("Validation Error: {0}")]
  Validation(String),

  /// The store could not persist the order or its items. No charge was attempted for
  /// a missing `order_id`; with an `order_id` the order exists and stays `pending`.
  #[error("Order Persistence Error: {message}")]
  OrderPersistence { order_id: Option<Uuid>, message: String },

  /// Network failure, timeout or non-2xx answer from the payment gateway.
  #[error("Payment Gateway Error: {message}")]
  PaymentGateway { order_id: Option<Uuid>, message: String },

  #[error("Reconciliation Error: {0}")]
  Reconciliation(String),

  #[error("Entitlement Provisioning Error (order item {order_item_id}): {message}")]
  EntitlementProvisioning { order_item_id: Uuid, message: String },

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn gateway(order_id: Option<Uuid>, message: impl Into<String>) -> Self {
    AppError::PaymentGateway {
      order_id,
      message: message.into(),
    }
  }

  pub fn persistence(order_id: Option<Uuid>, source: impl std::fmt::Display) -> Self {
    AppError::OrderPersistence {
      order_id,
      message: source.to_string(),
    }
  }

  /// Whether the caller may safely retry the same request.
  pub fn is_retryable(&self) -> bool {
    matches!(self, AppError::OrderPersistence { .. } | AppError::PaymentGateway { .. })
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<AppError>() {
      Ok(app_err) => app_err,
      Err(err) => match err.downcast::<sqlx::Error>() {
        Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
        Err(err) => AppError::Internal(err.to_string()),
      },
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::EmptyCart | AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::OrderPersistence { .. } => StatusCode::SERVICE_UNAVAILABLE,
      AppError::PaymentGateway { .. } => StatusCode::BAD_GATEWAY,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    tracing::error!(application_error = %self, "Responding with error");
    let status = self.status_code();
    match self {
      AppError::EmptyCart => HttpResponse::build(status).json(json!({"error": "Your cart is empty."})),
      AppError::Validation(m) | AppError::Auth(m) | AppError::NotFound(m) => {
        HttpResponse::build(status).json(json!({"error": m}))
      }
      AppError::OrderPersistence { order_id, .. } => HttpResponse::build(status).json(json!({
          "error": "We could not record your order. Please try again.",
          "orderId": order_id,
          "retryable": true
      })),
      AppError::PaymentGateway { order_id, .. } => HttpResponse::build(status).json(json!({
          "error": "Your payment is still processing. Check your order history before trying again.",
          "orderId": order_id,
          "retryable": true
      })),
      AppError::Config(m) => {
        HttpResponse::build(status).json(json!({"error": "Configuration issue", "detail": m}))
      }
      AppError::Sqlx(_) => HttpResponse::build(status).json(json!({"error": "Database operation failed"})),
      AppError::Workflow { source } => {
        tracing::error!(flow_error_source = ?source, "Workflow error details");
        HttpResponse::build(status).json(json!({"error": "Workflow processing error", "detail": source.to_string()}))
      }
      AppError::Reconciliation(_) | AppError::EntitlementProvisioning { .. } | AppError::Internal(_) => {
        HttpResponse::build(status).json(json!({"error": "An internal error occurred"}))
      }
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
