//! Error types for registry operations.

use modelgrid_state::StateError;
use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid model: {0}")]
    Validation(String),

    #[error("model not found: {0}")]
    NotFound(String),

    #[error("stage transition not allowed: {0}")]
    InvalidTransition(String),

    #[error(transparent)]
    State(#[from] StateError),
}
