//! Handlers for the model registry and the dashboard overview.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use modelgrid_registry::NewModel;
use modelgrid_state::{DeploymentStatus, ExperimentStatus, ModelRecord, Stage};

use crate::ApiState;
use crate::response::{
    ApiResponse, alert_error, deploy_error, error_response, experiment_error, registry_error,
};

/// A model decorated with its usage counts, computed at read time so the
/// stores stay uncoupled.
#[derive(serde::Serialize)]
pub struct ModelView {
    #[serde(flatten)]
    pub model: ModelRecord,
    pub deployments: usize,
    pub experiments: usize,
}

#[derive(serde::Deserialize)]
pub struct ListModelsQuery {
    pub status: Option<Stage>,
}

/// GET /api/v1/models
pub async fn list_models(
    State(state): State<ApiState>,
    Query(query): Query<ListModelsQuery>,
) -> impl IntoResponse {
    let models = match state.registry.list(query.status) {
        Ok(models) => models,
        Err(e) => return registry_error(&e),
    };
    match decorate(&state, models) {
        Ok(views) => ApiResponse::ok(views).into_response(),
        Err(resp) => resp,
    }
}

/// POST /api/v1/models
pub async fn register_model(
    State(state): State<ApiState>,
    Json(new): Json<NewModel>,
) -> impl IntoResponse {
    match state.registry.register(new) {
        Ok(record) => (StatusCode::CREATED, ApiResponse::ok(record)).into_response(),
        Err(e) => registry_error(&e),
    }
}

/// GET /api/v1/models/{id}
pub async fn get_model(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let record = match state.registry.get(&id) {
        Ok(record) => record,
        Err(e) => return registry_error(&e),
    };
    match decorate(&state, vec![record]) {
        Ok(views) => match views.into_iter().next() {
            Some(view) => ApiResponse::ok(view).into_response(),
            None => error_response("model not found", StatusCode::NOT_FOUND),
        },
        Err(resp) => resp,
    }
}

#[derive(serde::Deserialize)]
pub struct PromoteRequest {
    #[serde(rename = "status")]
    pub stage: Stage,
}

/// POST /api/v1/models/{id}/promote
pub async fn promote_model(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<PromoteRequest>,
) -> impl IntoResponse {
    match state.registry.update_stage(&id, req.stage) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => registry_error(&e),
    }
}

/// POST /api/v1/models/{id}/rollback
pub async fn rollback_model(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.registry.rollback(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => registry_error(&e),
    }
}

#[derive(serde::Deserialize)]
pub struct RetrainRequest {
    pub version: String,
    pub accuracy: f64,
}

/// POST /api/v1/models/{id}/retrain
pub async fn retrain_model(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<RetrainRequest>,
) -> impl IntoResponse {
    match state.registry.record_retrain(&id, &req.version, req.accuracy) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => registry_error(&e),
    }
}

/// POST /api/v1/models/{id}/archive
pub async fn archive_model(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.registry.archive(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => registry_error(&e),
    }
}

/// Dashboard overview counts.
#[derive(serde::Serialize)]
pub struct Overview {
    pub total_models: usize,
    pub active_deployments: usize,
    pub running_experiments: usize,
    pub active_alerts: usize,
}

/// GET /api/v1/overview
pub async fn overview(State(state): State<ApiState>) -> impl IntoResponse {
    let total_models = match state.registry.list(None) {
        Ok(models) => models.len(),
        Err(e) => return registry_error(&e),
    };
    let active_deployments = match state.tracker.list(None, None) {
        Ok(deployments) => deployments
            .iter()
            .filter(|d| d.status != DeploymentStatus::Draining)
            .count(),
        Err(e) => return deploy_error(&e),
    };
    let running_experiments = match state.experiments.list(None) {
        Ok(experiments) => experiments
            .iter()
            .filter(|e| e.status == ExperimentStatus::Running)
            .count(),
        Err(e) => return experiment_error(&e),
    };
    let active_alerts = match state.alerts.active_count() {
        Ok(count) => count,
        Err(e) => return alert_error(&e),
    };
    ApiResponse::ok(Overview {
        total_models,
        active_deployments,
        running_experiments,
        active_alerts,
    })
    .into_response()
}

fn decorate(
    state: &ApiState,
    models: Vec<ModelRecord>,
) -> Result<Vec<ModelView>, axum::response::Response> {
    let deployments = state.tracker.list(None, None).map_err(|e| deploy_error(&e))?;
    let experiments = state
        .experiments
        .list(None)
        .map_err(|e| experiment_error(&e))?;
    Ok(models
        .into_iter()
        .map(|model| {
            let deployments = deployments
                .iter()
                .filter(|d| d.model_name == model.name)
                .count();
            let experiments = experiments.iter().filter(|e| e.model == model.name).count();
            ModelView {
                model,
                deployments,
                experiments,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelgrid_core::config::DrainConfig;
    use modelgrid_deploy::DeployRequest;
    use modelgrid_state::{DeployStrategy, StateStore};

    fn test_state() -> ApiState {
        ApiState::new(StateStore::open_in_memory().unwrap(), DrainConfig::default())
    }

    fn fraud_model() -> NewModel {
        NewModel {
            name: "fraud-detection-v2.1".to_string(),
            version: "2.1.0".to_string(),
            stage: Stage::Production,
            accuracy: 95.8,
        }
    }

    #[tokio::test]
    async fn register_returns_created() {
        let state = test_state();
        let resp = register_model(State(state), Json(fraud_model())).await;
        assert_eq!(resp.into_response().status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn register_bad_semver_is_bad_request() {
        let state = test_state();
        let mut new = fraud_model();
        new.version = "two-point-one".to_string();
        let resp = register_model(State(state), Json(new)).await;
        assert_eq!(resp.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_decorates_with_counts() {
        let state = test_state();
        let record = state.registry.register(fraud_model()).unwrap();
        state
            .tracker
            .deploy(DeployRequest {
                model_name: record.name.clone(),
                environment: Stage::Production,
                strategy: DeployStrategy::BlueGreen,
                traffic: 100.0,
                instances: 5,
            })
            .unwrap();

        let resp = get_model(State(state), Path(record.id)).await;
        let resp = resp.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_missing_model_is_not_found() {
        let state = test_state();
        let resp = get_model(State(state), Path("model-99".to_string())).await;
        assert_eq!(resp.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn promote_skip_is_conflict() {
        let state = test_state();
        let mut new = fraud_model();
        new.stage = Stage::Development;
        let record = state.registry.register(new).unwrap();

        let resp = promote_model(
            State(state),
            Path(record.id),
            Json(PromoteRequest {
                stage: Stage::Production,
            }),
        )
        .await;
        assert_eq!(resp.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn overview_is_ok_on_empty_stores() {
        let state = test_state();
        let resp = overview(State(state)).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_accepts_stage_filter() {
        let state = test_state();
        state.registry.register(fraud_model()).unwrap();

        let resp = list_models(
            State(state),
            Query(ListModelsQuery {
                status: Some(Stage::Staging),
            }),
        )
        .await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
    }
}
