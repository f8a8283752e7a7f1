// core/src/pipeline/definition.rs

//! The `Pipeline<T, Err>` struct and its structural operations.

use crate::branch::BranchStepBuilder;
use crate::core::step::{SkipCondition, StepDef};
use crate::core::Handler;
use crate::error::FlowError;
use std::collections::HashMap;

/// An ordered list of named steps over a root context `T`.
///
/// Handlers return `Result<StepControl, Err>`. `Err` must be constructible from
/// `FlowError` so that engine-level problems (missing handlers, failed extraction,
/// unmatched branches) surface through the same error type as the handlers' own.
pub struct Pipeline<T, Err>
where
  T: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<T>>,
  pub(crate) before: HashMap<String, Vec<Handler<T, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<T, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<T, Err>>>,
}

impl<T, Err> Pipeline<T, Err>
where
  T: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new(steps: Vec<StepDef<T>>) -> Self {
    let mut seen = std::collections::HashSet::new();
    for step in &steps {
      if !seen.insert(step.name.clone()) {
        panic!("Pipeline setup error: duplicate step '{}'.", step.name);
      }
    }
    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  /// Step names in execution order.
  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn has_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  /// Panics on an unknown step: a typo in a step name is a wiring bug, not a runtime error.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.has_step(step_name) {
      panic!("Pipeline setup error: step '{}' not found.", step_name);
    }
  }

  fn position_of(&self, step_name: &str) -> Result<usize, FlowError> {
    self
      .steps
      .iter()
      .position(|s| s.name == step_name)
      .ok_or_else(|| FlowError::StepNotFound {
        step_name: step_name.to_string(),
      })
  }

  pub fn insert_before(&mut self, existing: &str, step: StepDef<T>) -> Result<(), FlowError> {
    self.reject_duplicate(&step.name)?;
    let idx = self.position_of(existing)?;
    self.steps.insert(idx, step);
    Ok(())
  }

  pub fn insert_after(&mut self, existing: &str, step: StepDef<T>) -> Result<(), FlowError> {
    self.reject_duplicate(&step.name)?;
    let idx = self.position_of(existing)?;
    self.steps.insert(idx + 1, step);
    Ok(())
  }

  /// Removes a step and every handler registered for it.
  pub fn remove_step(&mut self, step_name: &str) -> Result<(), FlowError> {
    let idx = self.position_of(step_name)?;
    self.steps.remove(idx);
    self.before.remove(step_name);
    self.on.remove(step_name);
    self.after.remove(step_name);
    Ok(())
  }

  pub fn set_optional(&mut self, step_name: &str, optional: bool) -> Result<(), FlowError> {
    let idx = self.position_of(step_name)?;
    self.steps[idx].optional = optional;
    Ok(())
  }

  pub fn set_skip_condition(&mut self, step_name: &str, skip_if: Option<SkipCondition<T>>) -> Result<(), FlowError> {
    let idx = self.position_of(step_name)?;
    self.steps[idx].skip_if = skip_if;
    Ok(())
  }

  fn reject_duplicate(&self, step_name: &str) -> Result<(), FlowError> {
    if self.has_step(step_name) {
      return Err(FlowError::ConfigurationError {
        step_name: step_name.to_string(),
        message: "step already exists".to_string(),
      });
    }
    Ok(())
  }

  /// Turns `step_name` into a branch step: the first branch whose condition holds runs
  /// its sub-pipeline. The step must already be declared.
  pub fn branch_step(&mut self, step_name: &str) -> BranchStepBuilder<'_, T, Err> {
    self.ensure_step_exists(step_name);
    BranchStepBuilder::new(self, step_name.to_string())
  }
}
