// storefront/src/state.rs

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::gateway::PaymentGateway;
use crate::pipelines;
use crate::services::entitlements::EntitlementProvisioner;
use crate::services::notifier::Notifier;
use crate::store::{CartCollaborator, LicenseRepository, OrderRepository, ProductCatalog};
use licenseshop_flow::FlowRegistry;
use std::sync::Arc;

/// The persistence-side collaborators, usually all backed by one store.
#[derive(Clone)]
pub struct Collaborators {
  pub orders: Arc<dyn OrderRepository>,
  pub licenses: Arc<dyn LicenseRepository>,
  pub catalog: Arc<dyn ProductCatalog>,
  pub cart: Arc<dyn CartCollaborator>,
}

impl Collaborators {
  pub fn from_store<S>(store: Arc<S>) -> Self
  where
    S: OrderRepository + LicenseRepository + ProductCatalog + CartCollaborator + 'static,
  {
    Self {
      orders: store.clone(),
      licenses: store.clone(),
      catalog: store.clone(),
      cart: store,
    }
  }
}

#[derive(Clone)]
pub struct AppState {
  pub orders: Arc<dyn OrderRepository>,
  pub licenses: Arc<dyn LicenseRepository>,
  pub catalog: Arc<dyn ProductCatalog>,
  pub cart: Arc<dyn CartCollaborator>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub notifier: Arc<dyn Notifier>,
  pub flow: Arc<FlowRegistry<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Builds the state and registers the checkout and reconciliation pipelines.
  pub fn new(
    config: Arc<AppConfig>,
    collaborators: Collaborators,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    let flow = Arc::new(FlowRegistry::<AppError>::new());
    pipelines::register_all_pipelines(&flow);
    Self {
      orders: collaborators.orders,
      licenses: collaborators.licenses,
      catalog: collaborators.catalog,
      cart: collaborators.cart,
      gateway,
      notifier,
      flow,
      config,
    }
  }

  pub fn provisioner(&self) -> EntitlementProvisioner {
    EntitlementProvisioner::new(self.licenses.clone())
  }
}
