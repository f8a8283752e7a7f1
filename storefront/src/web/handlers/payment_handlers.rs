// storefront/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::instrument;

use crate::errors::AppError;
use crate::state::AppState;

#[instrument(name = "handler::payment_methods", skip(app_state))]
pub async fn payment_methods_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let methods = app_state.gateway.payment_methods().await?;
  Ok(HttpResponse::Ok().json(methods))
}
