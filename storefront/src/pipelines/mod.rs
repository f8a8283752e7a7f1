// storefront/src/pipelines/mod.rs

//! Defines and registers the pipelines of the order–payment flow.

use crate::errors::AppError;
use licenseshop_flow::FlowRegistry;
use std::sync::Arc;

pub mod common_steps;
pub mod contexts;
pub mod payment_branches;

pub mod checkout_pipeline;
pub mod reconcile_pipeline;

/// Registers every pipeline with `registry`. Called once per `AppState`.
pub fn register_all_pipelines(registry: &Arc<FlowRegistry<AppError>>) {
  tracing::info!("Registering pipelines...");
  checkout_pipeline::register_checkout_pipeline(registry);
  reconcile_pipeline::register_reconcile_pipeline(registry);
  tracing::info!("All application pipelines registered.");
}
