// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::gateway::PaymentSelection;
use crate::models::{BillingAddress, BillingInfo, PaymentStatus};
use crate::services::checkout::{resolve_cart, CartLineRequest, CheckoutOrchestrator, CheckoutRequest};
use crate::state::AppState;
use crate::web::AuthenticatedUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
  pub billing: BillingAddress,
  pub items: Vec<CartLineRequest>,
  pub payment: PaymentSelection,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PreferencePayload {
  pub billing: BillingAddress,
  pub items: Vec<CartLineRequest>,
}

fn outcome_message(status: PaymentStatus) -> &'static str {
  match status {
    PaymentStatus::Approved => "Payment approved. Your licenses are ready.",
    PaymentStatus::Pending | PaymentStatus::PendingReview => {
      "Payment is awaiting confirmation. Follow its progress in your order history."
    }
    PaymentStatus::Rejected => "Payment was declined. Check your payment details and try again.",
  }
}

#[instrument(
    name = "handler::checkout",
    skip(app_state, payload, auth_user),
    fields(user_id = %auth_user.user_id, num_items = payload.items.len())
)]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CheckoutPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let cart = resolve_cart(app_state.catalog.as_ref(), &payload.items).await?;
  let request = CheckoutRequest {
    billing: BillingInfo {
      user_id: auth_user.user_id,
      email_verified: auth_user.email_verified,
      address: payload.billing,
    },
    cart,
    payment: payload.payment,
  };

  let outcome = CheckoutOrchestrator::new(app_state.get_ref().clone())
    .checkout(request)
    .await?;
  info!(order_id = %outcome.order_id, status = %outcome.status, "Checkout responded.");

  Ok(HttpResponse::Ok().json(json!({
      "status": outcome.status,
      "orderId": outcome.order_id,
      "paymentId": outcome.payment_id,
      "pix": outcome.pix.as_ref().map(|pix| json!({
          "qrCode": pix.qr_code,
          "qrCodeImage": pix.display_image_ref(),
          "ticketUrl": pix.ticket_url,
      })),
      "licenses": outcome.licenses,
      "message": outcome_message(outcome.status),
      "ordersUrl": format!("{}/profile/orders", app_state.config.app_base_url),
  })))
}

#[instrument(name = "handler::checkout_preference", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn preference_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<PreferencePayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let cart = resolve_cart(app_state.catalog.as_ref(), &payload.items).await?;
  let preference = CheckoutOrchestrator::new(app_state.get_ref().clone())
    .create_preference(cart, payload.billing)
    .await?;
  Ok(HttpResponse::Ok().json(preference))
}
