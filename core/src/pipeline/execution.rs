// core/src/pipeline/execution.rs

//! `Pipeline::run()`: walks the steps in order and drives each phase's handlers.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineOutcome, StepControl};
use crate::core::Handler;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, span, Instrument, Level};

/// Result of running one phase of one step.
enum PhaseResult<Err> {
  Continue,
  Stop,
  Failed(Err),
}

impl<T, Err> Pipeline<T, Err>
where
  T: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  async fn run_phase(phase: &'static str, handlers: Option<&Vec<Handler<T, Err>>>, ctx: &ContextData<T>) -> PhaseResult<Err> {
    let Some(handlers) = handlers else {
      return PhaseResult::Continue;
    };
    for (handler_idx, handler_fn) in handlers.iter().enumerate() {
      let handler_span = span!(Level::DEBUG, "step_handler", phase, handler_index = handler_idx);
      match handler_fn(ctx.clone()).instrument(handler_span).await {
        Ok(StepControl::Continue) => {}
        Ok(StepControl::Stop) => return PhaseResult::Stop,
        Err(e) => return PhaseResult::Failed(e),
      }
    }
    PhaseResult::Continue
  }

  /// Executes every step against `ctx`.
  ///
  /// A failing handler in a required step aborts the run with its error. A failing
  /// handler in an optional step is logged, the rest of that step is abandoned and the
  /// run moves on to the next step.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<T>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx: ContextData<T>) -> Result<PipelineOutcome, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = span!(
        Level::INFO,
        "pipeline_step",
        step_name,
        step_index = step_idx,
        optional = step_def.optional
      );

      if let Some(skip_if) = &step_def.skip_if {
        if skip_if(ctx.clone()) {
          event!(parent: &step_span, Level::DEBUG, "Step skipped by its skip condition.");
          continue;
        }
      }

      let before = self.before.get(step_name).filter(|v| !v.is_empty());
      let on = self.on.get(step_name).filter(|v| !v.is_empty());
      let after = self.after.get(step_name).filter(|v| !v.is_empty());

      if before.is_none() && on.is_none() && after.is_none() {
        if step_def.optional {
          event!(parent: &step_span, Level::DEBUG, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(parent: &step_span, Level::ERROR, "Required step has no handlers.");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      let step_result = async {
        for (phase, handlers) in [("before", before), ("on", on), ("after", after)] {
          match Self::run_phase(phase, handlers, &ctx).await {
            PhaseResult::Continue => {}
            other => return other,
          }
        }
        PhaseResult::Continue
      }
      .instrument(step_span.clone())
      .await;

      match step_result {
        PhaseResult::Continue => {
          event!(parent: &step_span, Level::DEBUG, "Step finished.");
        }
        PhaseResult::Stop => {
          event!(parent: &step_span, Level::INFO, "Pipeline stopped by a handler.");
          return Ok(PipelineOutcome::Stopped {
            step: step_def.name.clone(),
          });
        }
        PhaseResult::Failed(e) if step_def.optional => {
          event!(parent: &step_span, Level::WARN, error = %e, "Optional step failed; continuing.");
        }
        PhaseResult::Failed(e) => {
          event!(parent: &step_span, Level::ERROR, error = %e, "Step failed.");
          return Err(e);
        }
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineOutcome::Completed)
  }
}
