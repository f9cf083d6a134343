//! Error types for deployment tracker operations.

use modelgrid_state::StateError;
use thiserror::Error;

/// Result type alias for tracker operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that can occur during tracker operations.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid deployment: {0}")]
    Validation(String),

    #[error("deployment not found: {0}")]
    NotFound(String),

    #[error("operation not allowed: {0}")]
    InvalidState(String),

    #[error(
        "traffic overallocation for {budget}: requested {requested}%, only {available}% available"
    )]
    TrafficOverallocation {
        budget: String,
        requested: f64,
        available: f64,
    },

    #[error(transparent)]
    State(#[from] StateError),
}
