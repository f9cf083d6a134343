//! Error types for experiment log operations.

use modelgrid_state::StateError;
use thiserror::Error;

/// Result type alias for experiment log operations.
pub type ExperimentResult<T> = Result<T, ExperimentError>;

/// Errors that can occur during experiment log operations.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("invalid experiment: {0}")]
    Validation(String),

    #[error("experiment not found: {0}")]
    NotFound(String),

    #[error("operation not allowed: {0}")]
    InvalidState(String),

    #[error(transparent)]
    State(#[from] StateError),
}
