// storefront/src/gateway/types.rs

//! Payment intents on their way to the gateway, and the normalized answers coming back.

use crate::errors::{AppError, Result};
use crate::models::{BillingAddress, CartSnapshot};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub const CHARGE_DESCRIPTION: &str = "Software license purchase";
pub const PLACEHOLDER_DOCUMENT: &str = "00000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
  CreditCard,
  DebitCard,
  Pix,
}

impl PaymentMethodKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentMethodKind::CreditCard => "credit_card",
      PaymentMethodKind::DebitCard => "debit_card",
      PaymentMethodKind::Pix => "pix",
    }
  }

  pub fn is_card(&self) -> bool {
    !matches!(self, PaymentMethodKind::Pix)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerDocument {
  #[serde(rename = "type")]
  pub doc_type: String,
  pub number: String,
}

impl PayerDocument {
  pub fn placeholder() -> Self {
    Self {
      doc_type: "CPF".to_string(),
      number: PLACEHOLDER_DOCUMENT.to_string(),
    }
  }

  /// Upper-cases the type and strips formatting from the number. CPF/CNPJ numbers have 11 to 14 digits.
  pub fn normalized(&self) -> Result<Self> {
    let doc_type = self.doc_type.trim().to_ascii_uppercase();
    if doc_type != "CPF" && doc_type != "CNPJ" {
      return Err(AppError::Validation(format!("Unsupported document type '{}'.", self.doc_type)));
    }
    let number: String = self.number.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(11..=14).contains(&number.len()) {
      return Err(AppError::Validation("Document number must have 11 to 14 digits.".to_string()));
    }
    Ok(Self { doc_type, number })
  }
}

/// What the buyer chose at checkout, as submitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PaymentSelection {
  CreditCard {
    card_token: String,
    #[serde(default)]
    payment_method_id: Option<String>,
    #[serde(default)]
    installments: Option<u32>,
    document: PayerDocument,
  },
  DebitCard {
    card_token: String,
    #[serde(default)]
    payment_method_id: Option<String>,
    document: PayerDocument,
  },
  Pix {
    #[serde(default)]
    document: Option<PayerDocument>,
  },
}

impl PaymentSelection {
  pub fn kind(&self) -> PaymentMethodKind {
    match self {
      PaymentSelection::CreditCard { .. } => PaymentMethodKind::CreditCard,
      PaymentSelection::DebitCard { .. } => PaymentMethodKind::DebitCard,
      PaymentSelection::Pix { .. } => PaymentMethodKind::Pix,
    }
  }

  /// Checks the method-specific fields. A PIX payer without a document falls back to the
  /// billing document, then to the placeholder CPF.
  pub fn validate(&self, billing_document: Option<&str>, max_installments: u32) -> Result<ValidatedPayment> {
    match self {
      PaymentSelection::CreditCard {
        card_token,
        payment_method_id,
        installments,
        document,
      } => {
        let installments = installments.unwrap_or(1);
        if installments < 1 || installments > max_installments {
          return Err(AppError::Validation(format!(
            "Installments must be between 1 and {}.",
            max_installments
          )));
        }
        Ok(ValidatedPayment {
          method: ChargeMethod::CreditCard {
            token: require_token(card_token)?,
            payment_method_id: method_id_or(payment_method_id, "visa"),
            installments,
          },
          document: document.normalized()?,
        })
      }
      PaymentSelection::DebitCard {
        card_token,
        payment_method_id,
        document,
      } => Ok(ValidatedPayment {
        method: ChargeMethod::DebitCard {
          token: require_token(card_token)?,
          payment_method_id: method_id_or(payment_method_id, "maestro"),
        },
        document: document.normalized()?,
      }),
      PaymentSelection::Pix { document } => {
        let document = match document {
          Some(doc) => doc.normalized()?,
          None => billing_document
            .and_then(|number| {
              PayerDocument {
                doc_type: "CPF".to_string(),
                number: number.to_string(),
              }
              .normalized()
              .ok()
            })
            .unwrap_or_else(PayerDocument::placeholder),
        };
        Ok(ValidatedPayment {
          method: ChargeMethod::Pix,
          document,
        })
      }
    }
  }
}

fn require_token(token: &str) -> Result<String> {
  let token = token.trim();
  if token.is_empty() {
    return Err(AppError::Validation("A tokenized card is required.".to_string()));
  }
  Ok(token.to_string())
}

fn method_id_or(id: &Option<String>, default: &str) -> String {
  id.as_deref()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .unwrap_or(default)
    .to_string()
}

/// Method-specific charge fields, each variant carrying only what its rail needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeMethod {
  CreditCard {
    token: String,
    payment_method_id: String,
    installments: u32,
  },
  DebitCard {
    token: String,
    payment_method_id: String,
  },
  Pix,
}

impl ChargeMethod {
  pub fn kind(&self) -> PaymentMethodKind {
    match self {
      ChargeMethod::CreditCard { .. } => PaymentMethodKind::CreditCard,
      ChargeMethod::DebitCard { .. } => PaymentMethodKind::DebitCard,
      ChargeMethod::Pix => PaymentMethodKind::Pix,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayment {
  pub method: ChargeMethod,
  pub document: PayerDocument,
}

/// A single charge against an existing order.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
  pub order_id: Uuid,
  pub amount: Decimal,
  pub payer_email: String,
  pub payment: ValidatedPayment,
}

impl ChargeRequest {
  pub fn kind(&self) -> PaymentMethodKind {
    self.payment.method.kind()
  }

  /// Body of the `create_payment` action.
  pub fn to_action_data(&self) -> Result<Value> {
    let amount = self
      .amount
      .round_dp(2)
      .to_f64()
      .ok_or_else(|| AppError::Validation(format!("Amount {} cannot be charged.", self.amount)))?;

    let mut data = json!({
        "paymentMethod": self.kind().as_str(),
        "orderId": self.order_id,
        "transaction_amount": amount,
        "description": CHARGE_DESCRIPTION,
        "payer": {
            "email": self.payer_email,
            "document": self.payment.document,
        },
    });
    match &self.payment.method {
      ChargeMethod::CreditCard {
        token,
        payment_method_id,
        installments,
      } => {
        data["token"] = json!(token);
        data["payment_method_id"] = json!(payment_method_id);
        data["installments"] = json!(installments);
      }
      ChargeMethod::DebitCard {
        token,
        payment_method_id,
      } => {
        data["token"] = json!(token);
        data["payment_method_id"] = json!(payment_method_id);
        data["installments"] = json!(1);
      }
      ChargeMethod::Pix => {
        data["payment_method_id"] = json!("pix");
      }
    }
    Ok(data)
  }
}

/// Instant-payment instructions returned for a PIX charge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixInstructions {
  pub qr_code: String,
  pub qr_code_base64: Option<String>,
  pub ticket_url: Option<String>,
}

impl PixInstructions {
  /// Something a client can render: the inline QR image, else the processor's ticket page.
  pub fn display_image_ref(&self) -> Option<String> {
    match (&self.qr_code_base64, &self.ticket_url) {
      (Some(b64), _) => Some(format!("data:image/png;base64,{}", b64)),
      (None, Some(url)) => Some(url.clone()),
      (None, None) => None,
    }
  }
}

/// Gateway answer reduced to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GatewayPayment {
  pub payment_id: Option<String>,
  /// Four-letter processor code (`APRO`, `OTHE`, ...) or the raw detail when unknown.
  pub processor_code: Option<String>,
  pub raw_status: Option<String>,
  pub pix: Option<PixInstructions>,
}

/// Redirect-style checkout: the processor hosts the payment page.
#[derive(Debug, Clone)]
pub struct PreferenceRequest {
  pub external_reference: Uuid,
  pub cart: CartSnapshot,
  pub payer: BillingAddress,
  pub base_url: String,
  pub currency_id: String,
  pub statement_descriptor: String,
  pub max_installments: u32,
  pub excluded_payment_types: Vec<String>,
}

impl PreferenceRequest {
  pub fn to_action_data(&self) -> Result<Value> {
    let mut items = Vec::with_capacity(self.cart.lines().len());
    for line in self.cart.lines() {
      let unit_price = line
        .unit_price
        .round_dp(2)
        .to_f64()
        .ok_or_else(|| AppError::Validation(format!("Price {} cannot be charged.", line.unit_price)))?;
      items.push(json!({
          "id": line.product_id,
          "title": line.product_name,
          "description": format!("License for {}", line.product_name),
          "quantity": line.quantity,
          "unit_price": unit_price,
          "currency_id": self.currency_id,
      }));
    }
    let document = self.payer.document_number.as_deref().unwrap_or(PLACEHOLDER_DOCUMENT);
    let base = self.base_url.trim_end_matches('/');
    let excluded: Vec<Value> = self.excluded_payment_types.iter().map(|id| json!({ "id": id })).collect();

    Ok(json!({
        "items": items,
        "payer": {
            "email": self.payer.email,
            "name": self.payer.full_name(),
            "identification": { "type": "CPF", "number": document },
        },
        "back_urls": {
            "success": format!("{}/profile/orders", base),
            "pending": format!("{}/profile/orders", base),
            "failure": format!("{}/checkout", base),
        },
        "auto_return": "approved",
        "notification_url": format!("{}/api/v1/webhooks/payments", base),
        "statement_descriptor": self.statement_descriptor,
        "payment_methods": {
            "excluded_payment_types": excluded,
            "installments": self.max_installments,
        },
        "external_reference": self.external_reference,
    }))
  }
}
