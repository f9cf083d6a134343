//! Error types for alert feed operations.

use modelgrid_state::StateError;
use thiserror::Error;

/// Result type alias for alert feed operations.
pub type AlertResult<T> = Result<T, AlertError>;

/// Errors that can occur during alert feed operations.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert not found: {0}")]
    NotFound(String),

    #[error("alert already acknowledged: {0}")]
    AlreadyAcknowledged(String),

    #[error(transparent)]
    State(#[from] StateError),
}
