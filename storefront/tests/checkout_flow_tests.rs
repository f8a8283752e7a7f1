// tests/checkout_flow_tests.rs
mod common;

use common::*;
use licenseshop::errors::AppError;
use licenseshop::gateway::ChargeMethod;
use licenseshop::models::{CartSnapshot, OrderItem, PaymentStatus};
use licenseshop::services::checkout::CheckoutOrchestrator;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serial_test::serial;
use std::sync::atomic::Ordering;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn approved_pix_checkout_issues_licenses_and_clears_cart() {
  let h = harness(ScriptedGateway::answering("APRO"));
  let product = h.add_product("Editor Pro", dec!(100.00));
  let user_id = Uuid::new_v4();

  let outcome = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(user_id, cart_of(&[(&product, 2)]), pix()))
    .await
    .unwrap();

  assert_eq!(outcome.status, PaymentStatus::Approved);
  assert_eq!(outcome.payment_id.as_deref(), Some("pay_1"));
  assert!(outcome.pix.is_some(), "PIX checkouts return payment instructions");
  assert_eq!(outcome.licenses.len(), 1);
  assert!(outcome.licenses[0].is_active);
  assert_eq!(outcome.licenses[0].product_id, product.id);
  assert!(outcome.provisioning_failures.is_empty());

  let orders = h.store.all_orders();
  assert_eq!(orders.len(), 1);
  assert_eq!(orders[0].total, dec!(200.00));
  assert_eq!(orders[0].payment_status, PaymentStatus::Approved);
  assert_eq!(orders[0].payment_id(), Some("pay_1"));
  assert_eq!(h.store.all_licenses().len(), 1);
  assert_eq!(h.store.cleared_carts(), vec![user_id]);

  let charges = h.gateway.charges();
  assert_eq!(charges.len(), 1);
  assert_eq!(charges[0].amount, dec!(200.00));
  assert_eq!(charges[0].payment.method, ChargeMethod::Pix);

  settle_background_tasks().await;
  let sent = h.notifier.sent.lock().clone();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].status, PaymentStatus::Approved);
  assert_eq!(sent[0].licenses_issued, 1);
}

#[tokio::test]
#[serial]
async fn rejected_charge_issues_nothing_and_keeps_cart() {
  let h = harness(ScriptedGateway::answering("OTHE"));
  let product = h.add_product("Editor Pro", dec!(100.00));
  let user_id = Uuid::new_v4();

  let outcome = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(user_id, cart_of(&[(&product, 1)]), credit_card(3)))
    .await
    .unwrap();

  assert_eq!(outcome.status, PaymentStatus::Rejected);
  assert!(outcome.licenses.is_empty());
  assert!(h.store.all_licenses().is_empty());
  assert!(h.store.cleared_carts().is_empty());
  assert_eq!(h.store.all_orders()[0].payment_status, PaymentStatus::Rejected);

  settle_background_tasks().await;
  assert!(h.notifier.sent.lock().is_empty());
}

#[tokio::test]
#[serial]
async fn gateway_failure_leaves_order_pending_with_items() {
  let h = harness(ScriptedGateway::new(ChargeScript::Fail("connection refused")));
  let product = h.add_product("Editor Pro", dec!(49.90));
  let user_id = Uuid::new_v4();

  let err = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(user_id, cart_of(&[(&product, 1)]), pix()))
    .await
    .unwrap_err();

  let orders = h.store.all_orders();
  assert_eq!(orders.len(), 1);
  let order = &orders[0];
  match err {
    AppError::PaymentGateway { order_id, ref message } => {
      assert_eq!(order_id, Some(order.id));
      assert!(message.contains("connection refused"));
    }
    other => panic!("expected a gateway error, got {:?}", other),
  }
  assert!(err.is_retryable());
  assert_eq!(order.payment_status, PaymentStatus::Pending);
  assert_eq!(order.payment_id(), None);

  let items = licenseshop::store::OrderRepository::list_order_items(h.store.as_ref(), order.id)
    .await
    .unwrap();
  assert_eq!(items.len(), 1);
  assert!(h.store.all_licenses().is_empty());
  assert!(h.store.cleared_carts().is_empty());
}

#[tokio::test]
#[serial]
async fn gateway_timeout_is_a_gateway_error() {
  let h = harness(ScriptedGateway::new(ChargeScript::Hang));
  let product = h.add_product("Editor Pro", dec!(10.00));

  let err = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(Uuid::new_v4(), cart_of(&[(&product, 1)]), pix()))
    .await
    .unwrap_err();

  let order = h.store.all_orders().remove(0);
  assert!(matches!(err, AppError::PaymentGateway { order_id: Some(id), .. } if id == order.id));
  assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
#[serial]
async fn empty_cart_is_rejected_before_anything_is_written() {
  let h = harness(ScriptedGateway::answering("APRO"));

  let err = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(Uuid::new_v4(), CartSnapshot::empty(), pix()))
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::EmptyCart));
  assert_eq!(h.store.order_count(), 0);
  assert_eq!(h.gateway.charge_count(), 0);
}

#[tokio::test]
#[serial]
async fn unverified_buyer_is_rejected() {
  let h = harness(ScriptedGateway::answering("APRO"));
  let product = h.add_product("Editor Pro", dec!(10.00));
  let mut request = checkout_request(Uuid::new_v4(), cart_of(&[(&product, 1)]), pix());
  request.billing.email_verified = false;

  let err = CheckoutOrchestrator::new(h.state.clone()).checkout(request).await.unwrap_err();

  assert!(matches!(err, AppError::Validation(_)));
  assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
#[serial]
async fn too_many_installments_are_rejected() {
  let h = harness(ScriptedGateway::answering("APRO"));
  let product = h.add_product("Editor Pro", dec!(10.00));

  let err = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(Uuid::new_v4(), cart_of(&[(&product, 1)]), credit_card(13)))
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::Validation(_)));
  assert_eq!(h.store.order_count(), 0);
  assert_eq!(h.gateway.charge_count(), 0);
}

#[tokio::test]
#[serial]
async fn unknown_processor_code_keeps_order_pending() {
  let h = harness(ScriptedGateway::answering("XYZZY"));
  let product = h.add_product("Editor Pro", dec!(10.00));
  let user_id = Uuid::new_v4();

  let outcome = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(user_id, cart_of(&[(&product, 1)]), pix()))
    .await
    .unwrap();

  assert_eq!(outcome.status, PaymentStatus::Pending);
  assert!(outcome.licenses.is_empty());
  assert!(h.store.all_licenses().is_empty());
  // The payment id is kept so reconciliation can ask about it later.
  assert_eq!(h.store.all_orders()[0].payment_id(), Some("pay_1"));
  assert_eq!(h.store.cleared_carts(), vec![user_id]);
}

#[tokio::test]
#[serial]
async fn call_for_authorization_goes_to_manual_review() {
  let h = harness(ScriptedGateway::answering("CALL"));
  let product = h.add_product("Editor Pro", dec!(10.00));

  let outcome = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(Uuid::new_v4(), cart_of(&[(&product, 1)]), credit_card(1)))
    .await
    .unwrap();

  assert_eq!(outcome.status, PaymentStatus::PendingReview);
  assert!(outcome.licenses.is_empty());
}

#[tokio::test]
#[serial]
async fn card_charge_carries_token_installments_and_normalized_document() {
  let h = harness(ScriptedGateway::answering("APRO"));
  let product = h.add_product("Editor Pro", dec!(300.00));

  CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(Uuid::new_v4(), cart_of(&[(&product, 1)]), credit_card(6)))
    .await
    .unwrap();

  let charge = h.gateway.charges().remove(0);
  assert_eq!(
    charge.payment.method,
    ChargeMethod::CreditCard {
      token: "tok_test_visa".to_string(),
      payment_method_id: "visa".to_string(),
      installments: 6,
    }
  );
  assert_eq!(charge.payment.document.number, "12345678909");
  assert_eq!(charge.payer_email, "ana@example.com");
}

#[tokio::test]
#[serial]
async fn order_persistence_failure_never_reaches_the_gateway() {
  let h = harness(ScriptedGateway::answering("APRO"));
  h.flaky.fail_create_order.store(true, Ordering::SeqCst);
  let product = h.add_product("Editor Pro", dec!(10.00));

  let err = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(Uuid::new_v4(), cart_of(&[(&product, 1)]), pix()))
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::OrderPersistence { order_id: None, .. }));
  assert_eq!(h.store.order_count(), 0);
  assert_eq!(h.gateway.charge_count(), 0);
}

#[tokio::test]
#[serial]
async fn item_persistence_failure_leaves_a_pending_order_and_no_charge() {
  let h = harness(ScriptedGateway::answering("APRO"));
  h.flaky.fail_create_items.store(true, Ordering::SeqCst);
  let product = h.add_product("Editor Pro", dec!(10.00));

  let err = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(Uuid::new_v4(), cart_of(&[(&product, 1)]), pix()))
    .await
    .unwrap_err();

  let order = h.store.all_orders().remove(0);
  assert!(matches!(err, AppError::OrderPersistence { order_id: Some(id), .. } if id == order.id));
  assert_eq!(order.payment_status, PaymentStatus::Pending);
  assert_eq!(h.gateway.charge_count(), 0);
}

#[tokio::test]
#[serial]
async fn partial_license_failure_keeps_the_payment_approved() {
  let h = harness(ScriptedGateway::answering("APRO"));
  let editor = h.add_product("Editor Pro", dec!(100.00));
  let linter = h.add_product("Linter Plus", dec!(25.50));
  h.flaky.fail_licenses_for.lock().insert(linter.id);

  let outcome = CheckoutOrchestrator::new(h.state.clone())
    .checkout(checkout_request(Uuid::new_v4(), cart_of(&[(&editor, 1), (&linter, 1)]), pix()))
    .await
    .unwrap();

  assert_eq!(outcome.status, PaymentStatus::Approved);
  assert_eq!(outcome.licenses.len(), 1);
  assert_eq!(outcome.licenses[0].product_id, editor.id);
  assert_eq!(outcome.provisioning_failures.len(), 1);
  assert_eq!(outcome.provisioning_failures[0].product_id, linter.id);
  assert_eq!(h.store.all_orders()[0].payment_status, PaymentStatus::Approved);
}

#[tokio::test]
#[serial]
async fn order_total_matches_its_items_across_carts() {
  let h = harness(ScriptedGateway::answering("APRO"));
  let prices = [dec!(0.01), dec!(19.99), dec!(100.00), dec!(7.35), dec!(1234.56)];
  let products: Vec<_> = prices
    .iter()
    .enumerate()
    .map(|(i, price)| h.add_product(&format!("Tool {}", i), *price))
    .collect();
  let orchestrator = CheckoutOrchestrator::new(h.state.clone());

  for size in 1..=products.len() {
    let lines: Vec<_> = products.iter().take(size).enumerate().map(|(i, p)| (p, (i % 3 + 1) as i32)).collect();
    let expected: Decimal = lines.iter().map(|(p, q)| p.price * Decimal::from(*q)).sum();

    let outcome = orchestrator
      .checkout(checkout_request(Uuid::new_v4(), cart_of(&lines), pix()))
      .await
      .unwrap();

    let order = licenseshop::store::OrderRepository::find_order(h.store.as_ref(), outcome.order_id)
      .await
      .unwrap()
      .unwrap();
    let items = licenseshop::store::OrderRepository::list_order_items(h.store.as_ref(), order.id)
      .await
      .unwrap();
    let items_total: Decimal = items.iter().map(OrderItem::line_total).sum();

    assert_eq!(order.total, expected);
    assert_eq!(items_total, order.total);
    assert_eq!(outcome.licenses.len(), size);
  }
}

#[tokio::test]
#[serial]
async fn every_attempt_gets_its_own_order() {
  let h = harness(ScriptedGateway::answering("OTHE"));
  let product = h.add_product("Editor Pro", dec!(10.00));
  let user_id = Uuid::new_v4();
  let orchestrator = CheckoutOrchestrator::new(h.state.clone());

  let first = orchestrator
    .checkout(checkout_request(user_id, cart_of(&[(&product, 1)]), pix()))
    .await
    .unwrap();
  h.gateway.set_script(ChargeScript::Answer("APRO"));
  let second = orchestrator
    .checkout(checkout_request(user_id, cart_of(&[(&product, 1)]), pix()))
    .await
    .unwrap();

  assert_ne!(first.order_id, second.order_id);
  assert_eq!(h.store.order_count(), 2);
  let external_ids: std::collections::HashSet<_> = h.store.all_orders().iter().map(|o| o.external_id).collect();
  assert_eq!(external_ids.len(), 2);
  assert_eq!(second.status, PaymentStatus::Approved);
}

#[tokio::test]
#[serial]
async fn preference_request_describes_the_cart() {
  let h = harness(ScriptedGateway::answering("APRO"));
  let product = h.add_product("Editor Pro", dec!(59.90));

  let response = CheckoutOrchestrator::new(h.state.clone())
    .create_preference(cart_of(&[(&product, 2)]), billing_address("ana@example.com"))
    .await
    .unwrap();

  assert_eq!(response["id"], "pref_1");
  assert_eq!(h.store.order_count(), 0);
  let sent = h.gateway.preferences().remove(0);
  assert_eq!(sent["items"][0]["title"], "Editor Pro");
  assert_eq!(sent["items"][0]["description"], "License for Editor Pro");
  assert_eq!(sent["items"][0]["quantity"], 2);
}
