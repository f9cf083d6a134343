//! Handlers for the alert feed.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use modelgrid_state::{AlertKind, AlertSeverity};

use crate::ApiState;
use crate::response::{ApiResponse, alert_error};

#[derive(serde::Deserialize)]
pub struct ListAlertsQuery {
    /// Only unacknowledged alerts.
    #[serde(default)]
    pub active: bool,
}

/// GET /api/v1/alerts
pub async fn list_alerts(
    State(state): State<ApiState>,
    Query(query): Query<ListAlertsQuery>,
) -> impl IntoResponse {
    match state.alerts.list(query.active) {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(e) => alert_error(&e),
    }
}

#[derive(serde::Deserialize)]
pub struct RaiseAlertRequest {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub model: String,
}

/// POST /api/v1/alerts
pub async fn raise_alert(
    State(state): State<ApiState>,
    Json(req): Json<RaiseAlertRequest>,
) -> impl IntoResponse {
    match state
        .alerts
        .raise(req.kind, req.severity, &req.message, &req.model)
    {
        Ok(record) => (StatusCode::CREATED, ApiResponse::ok(record)).into_response(),
        Err(e) => alert_error(&e),
    }
}

/// POST /api/v1/alerts/{id}/acknowledge
pub async fn acknowledge_alert(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.alerts.acknowledge(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => alert_error(&e),
    }
}
