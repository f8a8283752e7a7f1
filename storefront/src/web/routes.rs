// storefront/src/web/routes.rs

use crate::web::handlers::{checkout_handlers, order_handlers, payment_handlers, webhook_handlers};
use actix_web::web;

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/checkout")
          .route("", web::post().to(checkout_handlers::checkout_handler))
          .route("/preference", web::post().to(checkout_handlers::preference_handler)),
      )
      .route(
        "/payment-methods",
        web::get().to(payment_handlers::payment_methods_handler),
      )
      .service(
        web::scope("/orders")
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler)),
      )
      .route("/licenses", web::get().to(order_handlers::list_licenses_handler))
      .service(
        web::scope("/webhooks").route(
          "/payments",
          web::post().to(webhook_handlers::payment_webhook_handler),
        ),
      ),
  );
}
