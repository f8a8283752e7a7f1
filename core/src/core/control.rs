// core/src/core/control.rs

//! Flow-control signals returned by handlers and the outcome of a whole run.

/// Returned by a handler to tell the pipeline whether to keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  /// Run the remaining handlers of this step, then the following steps.
  Continue,
  /// Halt the pipeline. Nothing after this handler runs.
  Stop,
}

/// Outcome of a pipeline run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
  /// Every non-skipped step ran.
  Completed,
  /// A handler returned `StepControl::Stop` while running `step`.
  Stopped { step: String },
}

impl PipelineOutcome {
  pub fn is_completed(&self) -> bool {
    matches!(self, PipelineOutcome::Completed)
  }

  /// Name of the step that halted the run, if any.
  pub fn stopped_at(&self) -> Option<&str> {
    match self {
      PipelineOutcome::Completed => None,
      PipelineOutcome::Stopped { step } => Some(step.as_str()),
    }
  }
}
