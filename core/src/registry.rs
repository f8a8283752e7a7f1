// core/src/registry.rs

//! `FlowRegistry<E>`: pipelines keyed by their root context type.
//!
//! The application registers one pipeline per context type (checkout, reconciliation,
//! ...) at startup and later runs whichever pipeline matches the context it builds.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineOutcome;
use crate::error::FlowError;
use crate::pipeline::Pipeline;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[async_trait]
trait ErasedRunner<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  /// `ctx` must hold the `ContextData<T>` of the wrapped pipeline.
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<PipelineOutcome, AppErr>;
  fn context_type_name(&self) -> &'static str;
}

struct RegisteredPipeline<T, PErr, AppErr>
where
  T: 'static + Send + Sync,
  PErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<PErr> + From<FlowError> + Send + Sync + 'static,
{
  pipeline: Arc<Pipeline<T, PErr>>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<T, PErr, AppErr> ErasedRunner<AppErr> for RegisteredPipeline<T, PErr, AppErr>
where
  T: 'static + Send + Sync,
  PErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<PErr> + From<FlowError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<PipelineOutcome, AppErr> {
    let typed = ctx.downcast::<ContextData<T>>().map_err(|_| {
      AppErr::from(FlowError::TypeMismatch {
        step_name: "registry_dispatch".to_string(),
        expected_type: std::any::type_name::<ContextData<T>>().to_string(),
      })
    })?;
    self.pipeline.run(*typed).await.map_err(AppErr::from)
  }

  fn context_type_name(&self) -> &'static str {
    std::any::type_name::<T>()
  }
}

/// Registry of pipelines, returning errors as the application error `AppErr`.
pub struct FlowRegistry<AppErr = FlowError>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pipelines: RwLock<HashMap<TypeId, Arc<dyn ErasedRunner<AppErr>>>>,
}

impl<AppErr> Default for FlowRegistry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<AppErr> FlowRegistry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      pipelines: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `pipeline` for context type `T`, replacing any earlier registration.
  pub fn register_pipeline<T, PErr>(&self, pipeline: Pipeline<T, PErr>)
  where
    T: 'static + Send + Sync,
    PErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
    AppErr: From<PErr>,
  {
    event!(Level::DEBUG, context_type = %std::any::type_name::<T>(), steps = ?pipeline.step_names(), "Registering pipeline.");
    let runner = RegisteredPipeline::<T, PErr, AppErr> {
      pipeline: Arc::new(pipeline),
      _app_err: PhantomData,
    };
    self.pipelines.write().insert(TypeId::of::<T>(), Arc::new(runner));
  }

  pub fn is_registered<T: 'static + Send + Sync>(&self) -> bool {
    self.pipelines.read().contains_key(&TypeId::of::<T>())
  }

  /// Names of the registered context types.
  pub fn registered_context_types(&self) -> Vec<&'static str> {
    self.pipelines.read().values().map(|r| r.context_type_name()).collect()
  }

  /// Runs the pipeline registered for `T`.
  #[instrument(name = "FlowRegistry::run", skip_all, fields(context_type = %std::any::type_name::<T>()))]
  pub async fn run<T>(&self, ctx: ContextData<T>) -> Result<PipelineOutcome, AppErr>
  where
    T: 'static + Send + Sync,
  {
    let runner = self.pipelines.read().get(&TypeId::of::<T>()).cloned();
    let runner = runner.ok_or_else(|| {
      event!(Level::ERROR, "No pipeline registered for this context type.");
      AppErr::from(FlowError::ConfigurationError {
        step_name: "FlowRegistry::run".to_string(),
        message: format!("no pipeline registered for {}", std::any::type_name::<T>()),
      })
    })?;
    runner.run_erased(Box::new(ctx)).await
  }
}
