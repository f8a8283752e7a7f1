// tests/common/mod.rs
#![allow(dead_code)]

use licenseshop_flow::{ContextData, FlowError, Handler, StepControl};
use once_cell::sync::Lazy;
use tracing::Level;

#[derive(Clone, Debug, Default)]
pub struct ChargeCtx {
  pub amount_cents: i64,
  pub method: String,
  pub journal: Vec<String>,
  pub stop_at: Option<String>,
  pub card: Option<ContextData<CardSubCtx>>,
  pub pix: Option<ContextData<PixSubCtx>>,
}

#[derive(Clone, Debug, Default)]
pub struct CardSubCtx {
  pub token: String,
  pub charged: bool,
}

#[derive(Clone, Debug, Default)]
pub struct PixSubCtx {
  pub qr_code: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("flow error: {0}")]
  Flow(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(err: FlowError) -> Self {
    TestError::Flow(format!("{:?}", err))
  }
}

/// Appends `step_name` to the journal; stops when `stop_at` names this step.
pub fn journaling_handler(step_name: &'static str) -> Handler<ChargeCtx, TestError> {
  Box::new(move |ctx: ContextData<ChargeCtx>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.journal.push(step_name.to_string());
      if guard.stop_at.as_deref() == Some(step_name) {
        return Ok(StepControl::Stop);
      }
      Ok(StepControl::Continue)
    })
  })
}

pub fn failing_handler(step_name: &'static str, message: &'static str) -> Handler<ChargeCtx, TestError> {
  Box::new(move |ctx: ContextData<ChargeCtx>| {
    Box::pin(async move {
      ctx.write().journal.push(format!("{}!", step_name));
      Err(TestError::Handler(message.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
