// core/src/lib.rs

//! licenseshop-flow: named-step async pipelines for multi-call business processes.
//!
//! A process such as "take a cart, persist an order, charge it, reconcile the
//! processor's answer, issue licenses" is a sequence of independently committing
//! calls. This crate expresses such a sequence as a `Pipeline<T, Err>`:
//!  - Named steps with before/on/after handlers.
//!  - `optional` steps whose handler failures are logged and swallowed, so follow-up
//!    work (notifications, entitlement issuance) never fails the overall run.
//!  - `skip_if` predicates evaluated against the shared context.
//!  - Early stop, reported together with the step that stopped the run.
//!  - Branch steps that dispatch to one of several sub-pipelines operating on an
//!    extracted sub-context (e.g. one sub-pipeline per payment method).
//!  - A type-keyed `FlowRegistry` for running registered pipelines by context type.

pub mod branch;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

// --- Re-exports for the Public API ---

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineOutcome, StepControl};
pub use crate::core::step::{SkipCondition, StepDef};
pub use crate::core::Handler;

pub use crate::pipeline::Pipeline;

pub use crate::branch::{BranchConfigurator, BranchStepBuilder, NoBranchMatch};

pub use crate::error::FlowError;

pub use crate::registry::FlowRegistry;

/*
    Typical use:
    1. Define a context struct `CheckoutCtx` holding inputs and the state each step fills in.
    2. Build a `Pipeline<CheckoutCtx, AppError>` from `StepDef`s.
    3. Register async handlers with `.on_root()`, `.before_root()`, `.after_root()`.
       Handlers must drop lock guards before every `.await`.
    4. For per-variant dispatch use `pipeline.branch_step("charge")`, chaining
       `.add_branch(label, sub_pipeline, extractor).when(condition)` and `.finalize()`.
    5. Register the pipeline in a `FlowRegistry<AppError>` and run it with
       `registry.run(ContextData::new(ctx)).await`.
*/
