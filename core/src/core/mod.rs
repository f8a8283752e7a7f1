pub mod context_data;
pub mod control;
pub mod step;

use std::future::Future;
use std::pin::Pin;

pub use context_data::ContextData;
pub use control::{PipelineOutcome, StepControl};
pub use step::StepDef;

/// Boxed async step handler.
///
/// Takes a clone of the shared context and resolves to the control signal for the
/// pipeline or the pipeline's error type. Guards taken from the context must be
/// released before the handler awaits anything.
pub type Handler<T, Err> = Box<
  dyn Fn(ContextData<T>) -> Pin<Box<dyn Future<Output = Result<StepControl, Err>> + Send>> + Send + Sync,
>;
