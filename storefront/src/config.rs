// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

impl FromStr for StoreBackend {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "postgres" | "pg" => Ok(StoreBackend::Postgres),
      "memory" | "mem" => Ok(StoreBackend::Memory),
      other => Err(AppError::Config(format!("Unknown STORE_BACKEND '{}'", other))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub store_backend: StoreBackend,
  pub database_url: Option<String>,
  pub run_migrations: bool,
  pub app_base_url: String,

  pub payment_gateway_url: String,
  pub payment_gateway_token: Option<String>,
  pub payment_gateway_timeout_secs: u64,
  pub max_installments: u32,
  pub currency_id: String,
  pub statement_descriptor: String,

  /// Zero disables the background sweeper.
  pub reconcile_interval_secs: u64,
  pub reconcile_min_age_secs: u64,

  pub notification_sender: String,
  pub log_format: String,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };

    fn parse<T: FromStr>(var_name: &str, raw: String) -> Result<T>
    where
      T::Err: std::fmt::Display,
    {
      raw
        .trim()
        .parse::<T>()
        .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", var_name, raw, e)))
    }

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port: u16 = parse("SERVER_PORT", get_env("SERVER_PORT").unwrap_or_else(|_| "8080".to_string()))?;
    let store_backend: StoreBackend = get_env("STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string()).parse()?;
    let database_url = match store_backend {
      StoreBackend::Postgres => Some(get_env("DATABASE_URL")?),
      StoreBackend::Memory => get_env("DATABASE_URL").ok(),
    };
    let run_migrations: bool = parse(
      "RUN_MIGRATIONS",
      get_env("RUN_MIGRATIONS").unwrap_or_else(|_| "false".to_string()),
    )?;
    let app_base_url = get_env("APP_BASE_URL")
      .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();

    let payment_gateway_url = get_env("PAYMENT_GATEWAY_URL")?;
    let payment_gateway_token = get_env("PAYMENT_GATEWAY_TOKEN").ok().filter(|t| !t.is_empty());
    let payment_gateway_timeout_secs: u64 = parse(
      "PAYMENT_GATEWAY_TIMEOUT_SECS",
      get_env("PAYMENT_GATEWAY_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string()),
    )?;
    let max_installments: u32 = parse(
      "MAX_INSTALLMENTS",
      get_env("MAX_INSTALLMENTS").unwrap_or_else(|_| "12".to_string()),
    )?;
    if max_installments == 0 {
      return Err(AppError::Config("MAX_INSTALLMENTS must be at least 1".to_string()));
    }
    let currency_id = get_env("CURRENCY_ID").unwrap_or_else(|_| "BRL".to_string());
    let statement_descriptor = get_env("STATEMENT_DESCRIPTOR").unwrap_or_else(|_| "LICENSESHOP".to_string());

    let reconcile_interval_secs: u64 = parse(
      "RECONCILE_INTERVAL_SECS",
      get_env("RECONCILE_INTERVAL_SECS").unwrap_or_else(|_| "300".to_string()),
    )?;
    let reconcile_min_age_secs: u64 = parse(
      "RECONCILE_MIN_AGE_SECS",
      get_env("RECONCILE_MIN_AGE_SECS").unwrap_or_else(|_| "120".to_string()),
    )?;

    let notification_sender = get_env("NOTIFICATION_SENDER").unwrap_or_else(|_| "noreply@example.com".to_string());
    let log_format = get_env("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      store_backend,
      database_url,
      run_migrations,
      app_base_url,
      payment_gateway_url,
      payment_gateway_token,
      payment_gateway_timeout_secs,
      max_installments,
      currency_id,
      statement_descriptor,
      reconcile_interval_secs,
      reconcile_min_age_secs,
      notification_sender,
      log_format,
    })
  }

  /// Defaults suitable for an in-memory store against the given gateway URL.
  pub fn for_gateway(payment_gateway_url: impl Into<String>) -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      store_backend: StoreBackend::Memory,
      database_url: None,
      run_migrations: false,
      app_base_url: "http://127.0.0.1:8080".to_string(),
      payment_gateway_url: payment_gateway_url.into(),
      payment_gateway_token: None,
      payment_gateway_timeout_secs: 30,
      max_installments: 12,
      currency_id: "BRL".to_string(),
      statement_descriptor: "LICENSESHOP".to_string(),
      reconcile_interval_secs: 0,
      reconcile_min_age_secs: 120,
      notification_sender: "noreply@example.com".to_string(),
      log_format: "pretty".to_string(),
    }
  }
}
