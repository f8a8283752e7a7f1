// tests/registry_tests.rs
mod common;

use common::*;
use licenseshop_flow::{ContextData, FlowRegistry, Pipeline, PipelineOutcome, StepControl, StepDef};
use serial_test::serial;

#[derive(Clone, Debug, Default)]
struct ReconcileCtx {
  attempts: u32,
}

#[tokio::test]
#[serial]
async fn registry_dispatches_by_context_type() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();

  let mut checkout = Pipeline::<ChargeCtx, TestError>::new(vec![StepDef::required("charge")]);
  checkout.on_root("charge", journaling_handler("charge"));
  registry.register_pipeline(checkout);

  let mut reconcile = Pipeline::<ReconcileCtx, TestError>::new(vec![StepDef::required("poll")]);
  reconcile.on_root("poll", |ctx: ContextData<ReconcileCtx>| async move {
    ctx.write().attempts += 1;
    Ok::<_, TestError>(StepControl::Continue)
  });
  registry.register_pipeline(reconcile);

  assert!(registry.is_registered::<ChargeCtx>());
  assert!(registry.is_registered::<ReconcileCtx>());
  assert_eq!(registry.registered_context_types().len(), 2);

  let charge_ctx = ContextData::new(ChargeCtx::default());
  assert_eq!(registry.run(charge_ctx.clone()).await.unwrap(), PipelineOutcome::Completed);
  assert_eq!(charge_ctx.read().journal, vec!["charge"]);

  let reconcile_ctx = ContextData::new(ReconcileCtx::default());
  registry.run(reconcile_ctx.clone()).await.unwrap();
  registry.run(reconcile_ctx.clone()).await.unwrap();
  assert_eq!(reconcile_ctx.read().attempts, 2);
}

#[tokio::test]
#[serial]
async fn running_unregistered_context_is_a_configuration_error() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();
  let err = registry.run(ContextData::new(ReconcileCtx::default())).await.unwrap_err();
  match err {
    TestError::Flow(s) => assert!(s.contains("ConfigurationError")),
    other => panic!("expected configuration error, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn context_data_helpers_share_state() {
  let ctx = ContextData::new(ReconcileCtx::default());
  let other = ctx.clone();
  other.with_write(|c| c.attempts = 7);
  assert!(ctx.same_context(&other));
  assert_eq!(ctx.with_read(|c| c.attempts), 7);
  assert_eq!(*ctx.map_read(|c| &c.attempts), 7);
  assert_eq!(ctx.snapshot().attempts, 7);
}
