// storefront/src/gateway/normalize.rs

//! Reduces the processor's native payment object to a `GatewayPayment`.

use crate::gateway::types::{GatewayPayment, PixInstructions};
use serde_json::Value;

const STATUS_DETAIL_CODES: [(&str, &str); 8] = [
  ("accredited", "APRO"),
  ("cc_rejected_other_reason", "OTHE"),
  ("pending_contingency", "CONT"),
  ("cc_rejected_call_for_authorize", "CALL"),
  ("cc_rejected_insufficient_amount", "FUND"),
  ("cc_rejected_bad_filled_security_code", "SECU"),
  ("cc_rejected_bad_filled_date", "EXPI"),
  ("cc_rejected_bad_filled_other", "FORM"),
];

/// Maps a `status_detail` onto the four-letter processor code. Four-letter codes pass
/// through upper-cased; anything else is returned verbatim.
pub fn processor_code_for_detail(detail: &str) -> String {
  let trimmed = detail.trim();
  if let Some((_, code)) = STATUS_DETAIL_CODES
    .iter()
    .find(|(known, _)| known.eq_ignore_ascii_case(trimmed))
  {
    return (*code).to_string();
  }
  if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
    return trimmed.to_ascii_uppercase();
  }
  trimmed.to_string()
}

fn string_field(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

pub fn normalize_payment(body: &Value) -> GatewayPayment {
  let payment_id = body.get("id").and_then(string_field);
  let processor_code = body
    .get("status_detail")
    .and_then(Value::as_str)
    .filter(|d| !d.trim().is_empty())
    .map(processor_code_for_detail);
  let raw_status = body.get("status").and_then(Value::as_str).map(str::to_string);

  let pix = body
    .pointer("/point_of_interaction/transaction_data")
    .and_then(|tx| {
      let qr_code = tx.get("qr_code").and_then(Value::as_str)?.to_string();
      Some(PixInstructions {
        qr_code,
        qr_code_base64: tx.get("qr_code_base64").and_then(Value::as_str).map(str::to_string),
        ticket_url: tx.get("ticket_url").and_then(Value::as_str).map(str::to_string),
      })
    });

  GatewayPayment {
    payment_id,
    processor_code,
    raw_status,
    pix,
  }
}
