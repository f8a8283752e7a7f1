// core/src/branch.rs

//! Branch steps: a step whose work is delegated to one of several sub-pipelines.
//!
//! Each branch pairs a condition over the root context with a sub-pipeline and an
//! extractor that hands the sub-pipeline its own `ContextData<S>`. The first branch whose
//! condition holds runs; the sub-pipeline's `Stopped` outcome stops the root pipeline too.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineOutcome, StepControl};
use crate::core::Handler;
use crate::error::FlowError;
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, Level};

type Extractor<T, S> = Arc<dyn Fn(ContextData<T>) -> Result<ContextData<S>, FlowError> + Send + Sync + 'static>;
type Condition<T> = Arc<dyn Fn(ContextData<T>) -> bool + Send + Sync + 'static>;

/// What a branch step does when no branch condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoBranchMatch {
  Continue,
  Stop,
  Fail,
}

struct Branch<T, S, Err>
where
  T: 'static + Send + Sync,
  S: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  label: String,
  pipeline: Arc<Pipeline<S, Err>>,
  extractor: Extractor<T, S>,
  condition: Condition<T>,
}

/// Type-erased branch so branches over different sub-context types share one list.
#[async_trait]
trait AnyBranch<T, Err>: Send + Sync
where
  T: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn label(&self) -> &str;
  fn matches(&self, ctx: ContextData<T>) -> bool;
  async fn run_branch(&self, step_name: &str, ctx: ContextData<T>) -> Result<StepControl, Err>;
}

#[async_trait]
impl<T, S, Err> AnyBranch<T, Err> for Branch<T, S, Err>
where
  T: 'static + Send + Sync,
  S: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn label(&self) -> &str {
    &self.label
  }

  fn matches(&self, ctx: ContextData<T>) -> bool {
    (self.condition)(ctx)
  }

  async fn run_branch(&self, step_name: &str, ctx: ContextData<T>) -> Result<StepControl, Err> {
    let sub_ctx = (self.extractor)(ctx).map_err(|e| {
      event!(Level::ERROR, step_name, branch = %self.label, error = %e, "Branch sub-context extraction failed.");
      let enriched = match e {
        FlowError::HandlerError { source } | FlowError::ExtractorFailure { source, .. } => FlowError::ExtractorFailure {
          step_name: step_name.to_string(),
          source,
        },
        other => other,
      };
      Err::from(enriched)
    })?;

    match self.pipeline.run(sub_ctx).await? {
      PipelineOutcome::Completed => Ok(StepControl::Continue),
      PipelineOutcome::Stopped { step } => {
        event!(Level::INFO, step_name, branch = %self.label, sub_step = %step, "Branch sub-pipeline stopped.");
        Ok(StepControl::Stop)
      }
    }
  }
}

/// Collects the branches of one step. Obtained from `Pipeline::branch_step`.
pub struct BranchStepBuilder<'p, T, Err>
where
  T: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pipeline: &'p mut Pipeline<T, Err>,
  step_name: String,
  branches: Vec<Arc<dyn AnyBranch<T, Err>>>,
  no_match: NoBranchMatch,
}

impl<'p, T, Err> BranchStepBuilder<'p, T, Err>
where
  T: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) fn new(pipeline: &'p mut Pipeline<T, Err>, step_name: String) -> Self {
    Self {
      pipeline,
      step_name,
      branches: Vec::new(),
      no_match: NoBranchMatch::Fail,
    }
  }

  /// Starts a branch running `sub_pipeline` on the sub-context produced by `extractor`.
  /// Complete it with `.when(condition)`.
  pub fn add_branch<S>(
    self,
    label: impl Into<String>,
    sub_pipeline: Arc<Pipeline<S, Err>>,
    extractor: impl Fn(ContextData<T>) -> Result<ContextData<S>, FlowError> + Send + Sync + 'static,
  ) -> BranchConfigurator<'p, T, S, Err>
  where
    S: 'static + Send + Sync,
  {
    BranchConfigurator {
      builder: self,
      label: label.into(),
      pipeline: sub_pipeline,
      extractor: Arc::new(extractor),
      _sub: PhantomData,
    }
  }

  /// Behavior when no branch matches. Defaults to `NoBranchMatch::Fail`.
  pub fn if_no_branch_matches(mut self, behavior: NoBranchMatch) -> Self {
    self.no_match = behavior;
    self
  }

  /// Installs the dispatching handler as the step's only `on` handler.
  pub fn finalize(self) {
    let branches = Arc::new(self.branches);
    let step_name = self.step_name.clone();
    let no_match = self.no_match;
    event!(Level::DEBUG, step_name = %step_name, num_branches = branches.len(), "Branch step finalized.");

    let dispatcher: Handler<T, Err> = Box::new(move |ctx: ContextData<T>| {
      let branches = branches.clone();
      let step_name = step_name.clone();
      Box::pin(async move {
        let chosen = branches.iter().find(|b| b.matches(ctx.clone())).cloned();
        match chosen {
          Some(branch) => {
            event!(Level::DEBUG, step_name = %step_name, branch = %branch.label(), "Branch matched.");
            branch.run_branch(&step_name, ctx).await
          }
          None => match no_match {
            NoBranchMatch::Continue => Ok(StepControl::Continue),
            NoBranchMatch::Stop => Ok(StepControl::Stop),
            NoBranchMatch::Fail => Err(Err::from(FlowError::NoBranchMatched { step_name })),
          },
        }
      })
    });

    self.pipeline.push_on_handler(&self.step_name, dispatcher);
  }
}

/// A branch awaiting its condition.
pub struct BranchConfigurator<'p, T, S, Err>
where
  T: 'static + Send + Sync,
  S: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  builder: BranchStepBuilder<'p, T, Err>,
  label: String,
  pipeline: Arc<Pipeline<S, Err>>,
  extractor: Extractor<T, S>,
  _sub: PhantomData<fn() -> S>,
}

impl<'p, T, S, Err> BranchConfigurator<'p, T, S, Err>
where
  T: 'static + Send + Sync,
  S: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn when(mut self, condition: impl Fn(ContextData<T>) -> bool + Send + Sync + 'static) -> BranchStepBuilder<'p, T, Err> {
    let branch = Branch {
      label: self.label,
      pipeline: self.pipeline,
      extractor: self.extractor,
      condition: Arc::new(condition),
    };
    self.builder.branches.push(Arc::new(branch));
    self.builder
  }
}
