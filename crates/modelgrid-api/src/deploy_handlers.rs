//! Handlers for the deployment tracker.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use modelgrid_deploy::DeployRequest;
use modelgrid_state::Stage;

use crate::ApiState;
use crate::response::{ApiResponse, deploy_error};

#[derive(serde::Deserialize)]
pub struct ListDeploymentsQuery {
    pub model: Option<String>,
    pub environment: Option<Stage>,
}

/// GET /api/v1/deployments
pub async fn list_deployments(
    State(state): State<ApiState>,
    Query(query): Query<ListDeploymentsQuery>,
) -> impl IntoResponse {
    match state
        .tracker
        .list(query.model.as_deref(), query.environment)
    {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(e) => deploy_error(&e),
    }
}

/// POST /api/v1/deployments
pub async fn create_deployment(
    State(state): State<ApiState>,
    Json(req): Json<DeployRequest>,
) -> impl IntoResponse {
    match state.tracker.deploy(req) {
        Ok(record) => (StatusCode::CREATED, ApiResponse::ok(record)).into_response(),
        Err(e) => deploy_error(&e),
    }
}

/// GET /api/v1/deployments/{id}
pub async fn get_deployment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.tracker.get(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => deploy_error(&e),
    }
}

/// POST /api/v1/deployments/{id}/drain
pub async fn drain_deployment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.tracker.drain(&id, state.drain.ramp_secs * 1000) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => deploy_error(&e),
    }
}

/// POST /api/v1/deployments/{id}/pause
pub async fn pause_deployment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.tracker.pause(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => deploy_error(&e),
    }
}

/// POST /api/v1/deployments/{id}/resume
pub async fn resume_deployment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.tracker.resume(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => deploy_error(&e),
    }
}

/// POST /api/v1/deployments/{id}/rollback
pub async fn rollback_deployment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state
        .tracker
        .rollback(&id, state.drain.rollback_ramp_secs * 1000)
    {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => deploy_error(&e),
    }
}

#[derive(serde::Deserialize)]
pub struct RecordMetricsRequest {
    pub cpu: f64,
    pub memory: f64,
    pub requests_per_min: u64,
}

/// PUT /api/v1/deployments/{id}/metrics
pub async fn record_deployment_metrics(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<RecordMetricsRequest>,
) -> impl IntoResponse {
    match state
        .tracker
        .record_metrics(&id, req.cpu, req.memory, req.requests_per_min)
    {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => deploy_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelgrid_core::config::DrainConfig;
    use modelgrid_state::{DeployStrategy, StateStore};

    fn test_state() -> ApiState {
        ApiState::new(StateStore::open_in_memory().unwrap(), DrainConfig::default())
    }

    fn canary(model: &str, traffic: f64) -> DeployRequest {
        DeployRequest {
            model_name: model.to_string(),
            environment: Stage::Production,
            strategy: DeployStrategy::Canary,
            traffic,
            instances: 2,
        }
    }

    #[tokio::test]
    async fn create_returns_created() {
        let state = test_state();
        let resp = create_deployment(State(state), Json(canary("fraud", 20.0))).await;
        assert_eq!(resp.into_response().status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn overallocation_is_conflict() {
        let state = test_state();
        state.tracker.deploy(canary("fraud", 100.0)).unwrap();

        let resp = create_deployment(State(state), Json(canary("fraud", 20.0))).await;
        assert_eq!(resp.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn bad_traffic_is_bad_request() {
        let state = test_state();
        let resp = create_deployment(State(state), Json(canary("fraud", 150.0))).await;
        assert_eq!(resp.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn drain_then_pause_is_conflict() {
        let state = test_state();
        let record = state.tracker.deploy(canary("fraud", 50.0)).unwrap();

        let resp = drain_deployment(State(state.clone()), Path(record.id.clone())).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);

        let resp = pause_deployment(State(state), Path(record.id)).await;
        assert_eq!(resp.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn metrics_roundtrip() {
        let state = test_state();
        let record = state.tracker.deploy(canary("fraud", 50.0)).unwrap();

        let resp = record_deployment_metrics(
            State(state.clone()),
            Path(record.id.clone()),
            Json(RecordMetricsRequest {
                cpu: 45.0,
                memory: 62.0,
                requests_per_min: 1250,
            }),
        )
        .await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
        assert_eq!(state.tracker.get(&record.id).unwrap().cpu, 45.0);
    }

    #[tokio::test]
    async fn unknown_deployment_is_not_found() {
        let state = test_state();
        let resp = get_deployment(State(state), Path("dep-99".to_string())).await;
        assert_eq!(resp.into_response().status(), StatusCode::NOT_FOUND);
    }
}
