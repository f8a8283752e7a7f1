// tests/error_handling_tests.rs
mod common;

use common::*;
use licenseshop_flow::{ContextData, FlowError, Pipeline, StepControl, StepDef};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn required_step_without_handlers_is_a_configuration_error() {
  setup_tracing();
  let pipeline = Pipeline::<ChargeCtx, TestError>::new(vec![StepDef::required("charge")]);
  let err = pipeline.run(ContextData::new(ChargeCtx::default())).await.unwrap_err();
  match err {
    TestError::Flow(s) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("charge"));
    }
    other => panic!("expected HandlerMissing, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn optional_step_without_handlers_is_skipped() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<ChargeCtx, TestError>::new(vec![StepDef::optional("notify"), StepDef::required("respond")]);
  pipeline.on_root("respond", journaling_handler("respond"));
  let ctx = ContextData::new(ChargeCtx::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().journal, vec!["respond"]);
}

#[tokio::test]
#[serial]
async fn pipeline_can_use_flow_error_directly() {
  setup_tracing();
  let mut pipeline = Pipeline::<ChargeCtx, FlowError>::new(vec![StepDef::required("charge")]);
  pipeline.on_root("charge", |_ctx: ContextData<ChargeCtx>| {
    Box::pin(async move { Err::<StepControl, FlowError>(FlowError::Internal("boom".to_string())) })
  });
  match pipeline.run(ContextData::new(ChargeCtx::default())).await {
    Err(FlowError::Internal(msg)) => assert_eq!(msg, "boom"),
    other => panic!("expected FlowError::Internal, got {:?}", other),
  }
}

#[test]
#[should_panic(expected = "not found")]
fn registering_on_unknown_step_panics() {
  let mut pipeline = Pipeline::<ChargeCtx, TestError>::new(vec![StepDef::required("charge")]);
  pipeline.on_root("chrage", journaling_handler("chrage"));
}

#[test]
#[should_panic(expected = "duplicate step")]
fn duplicate_step_names_panic() {
  let _ = Pipeline::<ChargeCtx, TestError>::new(vec![StepDef::required("charge"), StepDef::optional("charge")]);
}
