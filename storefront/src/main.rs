// storefront/src/main.rs

use licenseshop::config::{AppConfig, StoreBackend};
use licenseshop::errors::AppError;
use licenseshop::gateway::HttpPaymentGateway;
use licenseshop::services::notifier::LogNotifier;
use licenseshop::services::reconciliation;
use licenseshop::state::{AppState, Collaborators};
use licenseshop::store::{MemoryStore, PgStore};
use licenseshop::web::configure_app_routes;

use actix_web::{web as actix_data, App, HttpServer};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

fn init_tracing(log_format: &str) {
  let builder = tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE);
  if log_format.eq_ignore_ascii_case("json") {
    builder.json().init();
  } else {
    builder.init();
  }
}

fn startup_error(e: AppError) -> std::io::Error {
  tracing::error!(error = %e, "Startup failed.");
  std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

async fn build_collaborators(config: &AppConfig) -> Result<Collaborators, AppError> {
  match (config.store_backend, config.database_url.as_deref()) {
    (StoreBackend::Postgres, Some(database_url)) => {
      let store = PgStore::connect(database_url).await?;
      tracing::info!("Successfully connected to the database.");
      if config.run_migrations {
        store.run_migrations().await?;
        tracing::info!("Database migrations applied.");
      }
      Ok(Collaborators::from_store(Arc::new(store)))
    }
    (StoreBackend::Postgres, None) => Err(AppError::Config("DATABASE_URL is required for the postgres store".to_string())),
    (StoreBackend::Memory, _) => {
      tracing::warn!("Using the in-memory store; data is lost on restart.");
      Ok(Collaborators::from_store(Arc::new(MemoryStore::new())))
    }
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      eprintln!("Failed to load application configuration: {}", e);
      return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
  };
  init_tracing(&app_config.log_format);
  tracing::info!(store = ?app_config.store_backend, "Starting license storefront server...");

  let collaborators = build_collaborators(&app_config).await.map_err(startup_error)?;
  let gateway = Arc::new(HttpPaymentGateway::from_config(&app_config).map_err(startup_error)?);
  let notifier = Arc::new(LogNotifier::new(app_config.notification_sender.clone()));

  let app_state = AppState::new(app_config.clone(), collaborators, gateway, notifier);
  let _sweeper = reconciliation::spawn_sweeper(app_state.clone());

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
