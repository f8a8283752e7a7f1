// storefront/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::AuthenticatedUser;

#[instrument(name = "handler::list_orders", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.orders.list_orders_for_user(auth_user.user_id).await?;
  info!("Fetched {} orders.", orders.len());
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::get_order", skip(app_state, path, auth_user), fields(user_id = %auth_user.user_id, order_id = %*path))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  // Someone else's order is reported exactly like a missing one.
  let order = app_state
    .orders
    .find_order(order_id)
    .await?
    .filter(|o| o.user_id == auth_user.user_id)
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  let items = app_state.orders.list_order_items(order_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order, "items": items })))
}

#[instrument(name = "handler::list_licenses", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_licenses_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let licenses = app_state.licenses.list_licenses_for_user(auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "licenses": licenses })))
}
