// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use licenseshop::config::AppConfig;
use licenseshop::errors::{AppError, Result as AppResult};
use licenseshop::gateway::{
  ChargeRequest, GatewayPayment, PayerDocument, PaymentGateway, PaymentMethodKind, PaymentSelection, PixInstructions,
  PreferenceRequest,
};
use licenseshop::models::{
  BillingAddress, BillingInfo, CartLine, CartSnapshot, License, NewLicense, NewOrder, NewOrderItem, Order, OrderItem,
  PaymentStatus, Product,
};
use licenseshop::services::checkout::CheckoutRequest;
use licenseshop::services::notifier::{Notifier, OrderConfirmation, SentNotification};
use licenseshop::state::{AppState, Collaborators};
use licenseshop::store::{CartCollaborator, LicenseRepository, MemoryStore, OrderRepository, ProductCatalog};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

// --- Gateway double ---

/// How the scripted gateway answers `create_payment`.
#[derive(Debug, Clone)]
pub enum ChargeScript {
  /// Accepts the charge with this processor code.
  Answer(&'static str),
  /// Fails the call as a transport error would.
  Fail(&'static str),
  /// Never answers within any reasonable timeout.
  Hang,
}

pub struct ScriptedGateway {
  script: Mutex<ChargeScript>,
  charges: Mutex<Vec<ChargeRequest>>,
  statuses: Mutex<HashMap<String, String>>,
  preferences: Mutex<Vec<Value>>,
  next_id: AtomicUsize,
  status_calls: AtomicUsize,
}

impl ScriptedGateway {
  pub fn new(script: ChargeScript) -> Arc<Self> {
    Arc::new(Self {
      script: Mutex::new(script),
      charges: Mutex::new(Vec::new()),
      statuses: Mutex::new(HashMap::new()),
      preferences: Mutex::new(Vec::new()),
      next_id: AtomicUsize::new(1),
      status_calls: AtomicUsize::new(0),
    })
  }

  pub fn answering(code: &'static str) -> Arc<Self> {
    Self::new(ChargeScript::Answer(code))
  }

  pub fn set_script(&self, script: ChargeScript) {
    *self.script.lock() = script;
  }

  /// What `payment_status` will report for `payment_id` from now on.
  pub fn settle(&self, payment_id: &str, code: &str) {
    self.statuses.lock().insert(payment_id.to_string(), code.to_string());
  }

  pub fn charges(&self) -> Vec<ChargeRequest> {
    self.charges.lock().clone()
  }

  pub fn charge_count(&self) -> usize {
    self.charges.lock().len()
  }

  pub fn status_calls(&self) -> usize {
    self.status_calls.load(Ordering::SeqCst)
  }

  pub fn preferences(&self) -> Vec<Value> {
    self.preferences.lock().clone()
  }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
  async fn create_payment(&self, request: &ChargeRequest) -> AppResult<GatewayPayment> {
    self.charges.lock().push(request.clone());
    let script = self.script.lock().clone();
    match script {
      ChargeScript::Answer(code) => {
        let payment_id = format!("pay_{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.statuses.lock().insert(payment_id.clone(), code.to_string());
        let pix = (request.kind() == PaymentMethodKind::Pix).then(|| PixInstructions {
          qr_code: format!("00020126pix{}", payment_id),
          qr_code_base64: Some("iVBORw0KGgo=".to_string()),
          ticket_url: Some(format!("https://pay.example.com/tickets/{}", payment_id)),
        });
        Ok(GatewayPayment {
          payment_id: Some(payment_id),
          processor_code: Some(code.to_string()),
          raw_status: None,
          pix,
        })
      }
      ChargeScript::Fail(message) => Err(AppError::gateway(None, message)),
      ChargeScript::Hang => {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(AppError::gateway(None, "hung gateway woke up"))
      }
    }
  }

  async fn payment_methods(&self) -> AppResult<Value> {
    Ok(json!([{ "id": "visa", "payment_type_id": "credit_card" }, { "id": "pix", "payment_type_id": "bank_transfer" }]))
  }

  async fn payment_status(&self, payment_id: &str) -> AppResult<GatewayPayment> {
    self.status_calls.fetch_add(1, Ordering::SeqCst);
    let code = self
      .statuses
      .lock()
      .get(payment_id)
      .cloned()
      .ok_or_else(|| AppError::gateway(None, format!("unknown payment {}", payment_id)))?;
    Ok(GatewayPayment {
      payment_id: Some(payment_id.to_string()),
      processor_code: Some(code),
      raw_status: None,
      pix: None,
    })
  }

  async fn create_preference(&self, request: &PreferenceRequest) -> AppResult<Value> {
    let data = request.to_action_data()?;
    self.preferences.lock().push(data);
    Ok(json!({ "id": "pref_1", "init_point": "https://pay.example.com/checkout/pref_1" }))
  }
}

// --- Store double ---

/// Delegates to a `MemoryStore`, failing chosen operations on demand.
pub struct FlakyStore {
  pub inner: Arc<MemoryStore>,
  pub fail_create_order: AtomicBool,
  pub fail_create_items: AtomicBool,
  pub fail_licenses_for: Mutex<HashSet<Uuid>>,
}

impl FlakyStore {
  pub fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
    Arc::new(Self {
      inner,
      fail_create_order: AtomicBool::new(false),
      fail_create_items: AtomicBool::new(false),
      fail_licenses_for: Mutex::new(HashSet::new()),
    })
  }
}

#[async_trait]
impl OrderRepository for FlakyStore {
  async fn create_order(&self, new_order: NewOrder) -> AppResult<Order> {
    if self.fail_create_order.load(Ordering::SeqCst) {
      return Err(AppError::Internal("connection reset while inserting order".to_string()));
    }
    self.inner.create_order(new_order).await
  }

  async fn create_order_items(&self, order_id: Uuid, items: &[NewOrderItem]) -> AppResult<Vec<OrderItem>> {
    if self.fail_create_items.load(Ordering::SeqCst) {
      return Err(AppError::Internal("connection reset while inserting items".to_string()));
    }
    self.inner.create_order_items(order_id, items).await
  }

  async fn transition_payment_status(
    &self,
    order_id: Uuid,
    from: &[PaymentStatus],
    to: PaymentStatus,
    payment_id: Option<&str>,
  ) -> AppResult<Option<Order>> {
    self.inner.transition_payment_status(order_id, from, to, payment_id).await
  }

  async fn find_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
    self.inner.find_order(order_id).await
  }

  async fn find_order_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Order>> {
    self.inner.find_order_by_payment_id(payment_id).await
  }

  async fn list_order_items(&self, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    self.inner.list_order_items(order_id).await
  }

  async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
    self.inner.list_orders_for_user(user_id).await
  }

  async fn list_unsettled_orders(&self, older_than: chrono::DateTime<chrono::Utc>, limit: i64) -> AppResult<Vec<Order>> {
    self.inner.list_unsettled_orders(older_than, limit).await
  }

  async fn mark_reconciled(&self, order_id: Uuid) -> AppResult<()> {
    self.inner.mark_reconciled(order_id).await
  }
}

#[async_trait]
impl LicenseRepository for FlakyStore {
  async fn create_license(&self, new_license: NewLicense) -> AppResult<License> {
    if self.fail_licenses_for.lock().contains(&new_license.product_id) {
      return Err(AppError::Internal("license table unavailable".to_string()));
    }
    self.inner.create_license(new_license).await
  }

  async fn list_licenses_for_user(&self, user_id: Uuid) -> AppResult<Vec<License>> {
    self.inner.list_licenses_for_user(user_id).await
  }
}

#[async_trait]
impl ProductCatalog for FlakyStore {
  async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
    self.inner.find_products(ids).await
  }
}

#[async_trait]
impl CartCollaborator for FlakyStore {
  async fn clear_cart(&self, user_id: Uuid) -> AppResult<()> {
    self.inner.clear_cart(user_id).await
  }
}

// --- Notifier double ---

#[derive(Default)]
pub struct RecordingNotifier {
  pub sent: Mutex<Vec<OrderConfirmation>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> AppResult<SentNotification> {
    self.sent.lock().push(confirmation.clone());
    Ok(SentNotification {
      to: confirmation.recipient_email.clone(),
      subject: confirmation.subject(),
      message_id: format!("test_{}", confirmation.order_id),
    })
  }
}

// --- Fixtures ---

pub struct Harness {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub flaky: Arc<FlakyStore>,
  pub gateway: Arc<ScriptedGateway>,
  pub notifier: Arc<RecordingNotifier>,
}

pub fn test_config() -> AppConfig {
  let mut config = AppConfig::for_gateway("http://gateway.invalid/api");
  config.payment_gateway_timeout_secs = 1;
  config
}

pub fn harness(gateway: Arc<ScriptedGateway>) -> Harness {
  harness_with_config(gateway, test_config())
}

pub fn harness_with_config(gateway: Arc<ScriptedGateway>, config: AppConfig) -> Harness {
  setup_tracing();
  let store = Arc::new(MemoryStore::new());
  let flaky = FlakyStore::new(store.clone());
  let notifier = Arc::new(RecordingNotifier::default());
  let state = AppState::new(
    Arc::new(config),
    Collaborators::from_store(flaky.clone()),
    gateway.clone(),
    notifier.clone(),
  );
  Harness {
    state,
    store,
    flaky,
    gateway,
    notifier,
  }
}

impl Harness {
  pub fn add_product(&self, name: &str, price: Decimal) -> Product {
    let product = Product::new(name, price);
    self.store.insert_product(product.clone());
    product
  }
}

pub fn billing_address(email: &str) -> BillingAddress {
  BillingAddress {
    first_name: "Ana".to_string(),
    last_name: "Souza".to_string(),
    email: email.to_string(),
    phone: None,
    address: Some("Rua das Flores 10".to_string()),
    city: Some("Recife".to_string()),
    state: Some("PE".to_string()),
    zip_code: Some("50000-000".to_string()),
    country: Some("BR".to_string()),
    document_number: Some("12345678909".to_string()),
  }
}

pub fn verified_buyer(user_id: Uuid) -> BillingInfo {
  BillingInfo {
    user_id,
    email_verified: true,
    address: billing_address("ana@example.com"),
  }
}

pub fn cart_of(lines: &[(&Product, i32)]) -> CartSnapshot {
  CartSnapshot::new(
    lines
      .iter()
      .map(|(product, quantity)| CartLine {
        product_id: product.id,
        product_name: product.name.clone(),
        unit_price: product.price,
        quantity: *quantity,
      })
      .collect(),
  )
}

pub fn pix() -> PaymentSelection {
  PaymentSelection::Pix { document: None }
}

pub fn credit_card(installments: u32) -> PaymentSelection {
  PaymentSelection::CreditCard {
    card_token: "tok_test_visa".to_string(),
    payment_method_id: None,
    installments: Some(installments),
    document: PayerDocument {
      doc_type: "CPF".to_string(),
      number: "123.456.789-09".to_string(),
    },
  }
}

pub fn checkout_request(user_id: Uuid, cart: CartSnapshot, payment: PaymentSelection) -> CheckoutRequest {
  CheckoutRequest {
    billing: verified_buyer(user_id),
    cart,
    payment,
  }
}

/// Lets detached notification tasks run.
pub async fn settle_background_tasks() {
  tokio::time::sleep(Duration::from_millis(50)).await;
}
