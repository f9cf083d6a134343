//! Response envelope and error-to-status mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use modelgrid_alert::AlertError;
use modelgrid_deploy::DeployError;
use modelgrid_experiment::ExperimentError;
use modelgrid_registry::RegistryError;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
pub struct ApiResponse<T: serde::Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub fn error_response(msg: &str, status: StatusCode) -> axum::response::Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

pub fn registry_error(e: &RegistryError) -> axum::response::Response {
    let status = match e {
        RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::InvalidTransition(_) => StatusCode::CONFLICT,
        RegistryError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}

pub fn deploy_error(e: &DeployError) -> axum::response::Response {
    let status = match e {
        DeployError::Validation(_) => StatusCode::BAD_REQUEST,
        DeployError::NotFound(_) => StatusCode::NOT_FOUND,
        DeployError::InvalidState(_) | DeployError::TrafficOverallocation { .. } => {
            StatusCode::CONFLICT
        }
        DeployError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}

pub fn experiment_error(e: &ExperimentError) -> axum::response::Response {
    let status = match e {
        ExperimentError::Validation(_) => StatusCode::BAD_REQUEST,
        ExperimentError::NotFound(_) => StatusCode::NOT_FOUND,
        ExperimentError::InvalidState(_) => StatusCode::CONFLICT,
        ExperimentError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}

pub fn alert_error(e: &AlertError) -> axum::response::Response {
    let status = match e {
        AlertError::NotFound(_) => StatusCode::NOT_FOUND,
        AlertError::AlreadyAcknowledged(_) => StatusCode::CONFLICT,
        AlertError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}
