// storefront/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::services::reconciliation::reconcile_payment;
use crate::state::AppState;

/// The payment id named by a processor notification, from the JSON body or the query
/// string (`type`/`topic` and `data.id`/`id`). `Ok(None)` for non-payment topics.
pub fn payment_id_from_notification(body: &Value, query: &HashMap<String, String>) -> Result<Option<String>, AppError> {
  let kind = body
    .get("type")
    .or_else(|| body.get("topic"))
    .and_then(Value::as_str)
    .map(str::to_string)
    .or_else(|| query.get("type").or_else(|| query.get("topic")).cloned());
  if let Some(kind) = kind.as_deref() {
    if kind != "payment" {
      return Ok(None);
    }
  }

  let from_body = body.pointer("/data/id").and_then(|id| match id {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  });
  from_body
    .or_else(|| query.get("data.id").or_else(|| query.get("id")).cloned())
    .map(Some)
    .ok_or_else(|| AppError::Validation("Notification does not name a payment.".to_string()))
}

#[instrument(name = "handler::payment_webhook", skip(app_state, query, body), fields(body_len = body.len()))]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  query: web::Query<HashMap<String, String>>,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let payload: Value = if body.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&body).map_err(|e| AppError::Validation(format!("Malformed notification: {}", e)))?
  };

  let payment_id = match payment_id_from_notification(&payload, &query)? {
    Some(id) => id,
    None => {
      info!("Ignoring non-payment notification.");
      return Ok(HttpResponse::Ok().json(json!({ "received": true, "ignored": true })));
    }
  };

  // The processor only needs an acknowledgement; failed reconciliations are retried by the sweeper.
  let report = match reconcile_payment(app_state.get_ref(), &payment_id).await {
    Ok(report) => report,
    Err(e) => {
      warn!(%payment_id, error = %e, "Reconciliation from notification failed.");
      None
    }
  };
  Ok(HttpResponse::Ok().json(json!({ "received": true, "paymentId": payment_id, "reconciled": report })))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_payment_id_from_body_or_query() {
    let none = HashMap::new();
    assert_eq!(
      payment_id_from_notification(&json!({"type": "payment", "data": {"id": 123}}), &none).ok(),
      Some(Some("123".to_string()))
    );
    assert_eq!(
      payment_id_from_notification(&json!({"topic": "payment", "data": {"id": "abc"}}), &none).ok(),
      Some(Some("abc".to_string()))
    );

    let query: HashMap<String, String> =
      [("type".to_string(), "payment".to_string()), ("data.id".to_string(), "77".to_string())].into();
    assert_eq!(payment_id_from_notification(&Value::Null, &query).ok(), Some(Some("77".to_string())));
  }

  #[test]
  fn ignores_other_topics_and_rejects_missing_ids() {
    let none = HashMap::new();
    assert_eq!(
      payment_id_from_notification(&json!({"type": "merchant_order", "data": {"id": 1}}), &none).ok(),
      Some(None)
    );
    assert!(payment_id_from_notification(&json!({"type": "payment"}), &none).is_err());
  }
}
