// core/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Step not found: {step_name}")]
    StepNotFound { step_name: String },

    #[error("Handler missing for non-optional step: {step_name}")]
    HandlerMissing { step_name: String },

    #[error("Sub-context extraction failed for step '{step_name}'. Source: {source}")]
    ExtractorFailure {
        step_name: String,
        #[source]
        source: AnyhowError,
    },

    #[error("Context type mismatch in '{step_name}' (expected {expected_type})")]
    TypeMismatch { step_name: String, expected_type: String },

    #[error("No branch condition matched for step '{step_name}'")]
    NoBranchMatched { step_name: String },

    #[error("Error in handler or external operation. Source: {source}")]
    HandlerError {
        #[source]
        source: AnyhowError,
    },

    #[error("Configuration error for '{step_name}': {message}")]
    ConfigurationError { step_name: String, message: String },

    #[error("Internal flow error: {0}")]
    Internal(String),
}

impl From<AnyhowError> for FlowError {
    fn from(err: AnyhowError) -> Self {
        match err.downcast::<FlowError>() {
            Ok(flow_err) => flow_err,
            Err(other) => FlowError::HandlerError { source: other },
        }
    }
}
