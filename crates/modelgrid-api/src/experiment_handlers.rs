//! Handlers for the experiment log.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use modelgrid_experiment::NewExperiment;
use modelgrid_state::ExperimentMetrics;

use crate::ApiState;
use crate::response::{ApiResponse, experiment_error};

#[derive(serde::Deserialize)]
pub struct ListExperimentsQuery {
    pub model: Option<String>,
}

/// GET /api/v1/experiments
pub async fn list_experiments(
    State(state): State<ApiState>,
    Query(query): Query<ListExperimentsQuery>,
) -> impl IntoResponse {
    match state.experiments.list(query.model.as_deref()) {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(e) => experiment_error(&e),
    }
}

#[derive(serde::Deserialize)]
pub struct CreateExperimentRequest {
    #[serde(flatten)]
    pub experiment: NewExperiment,
    /// Create in the queue instead of starting immediately.
    #[serde(default)]
    pub queued: bool,
}

/// POST /api/v1/experiments
pub async fn create_experiment(
    State(state): State<ApiState>,
    Json(req): Json<CreateExperimentRequest>,
) -> impl IntoResponse {
    let result = if req.queued {
        state.experiments.enqueue(req.experiment)
    } else {
        state.experiments.start(req.experiment)
    };
    match result {
        Ok(record) => (StatusCode::CREATED, ApiResponse::ok(record)).into_response(),
        Err(e) => experiment_error(&e),
    }
}

/// GET /api/v1/experiments/{id}
pub async fn get_experiment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.experiments.get(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => experiment_error(&e),
    }
}

/// POST /api/v1/experiments/{id}/launch
pub async fn launch_experiment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.experiments.launch(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => experiment_error(&e),
    }
}

/// POST /api/v1/experiments/{id}/complete
pub async fn complete_experiment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(metrics): Json<ExperimentMetrics>,
) -> impl IntoResponse {
    match state.experiments.complete(&id, metrics) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => experiment_error(&e),
    }
}

#[derive(serde::Deserialize)]
pub struct FailRequest {
    pub reason: String,
}

/// POST /api/v1/experiments/{id}/fail
pub async fn fail_experiment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<FailRequest>,
) -> impl IntoResponse {
    match state.experiments.fail(&id, &req.reason) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => experiment_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelgrid_core::config::DrainConfig;
    use modelgrid_state::StateStore;

    fn test_state() -> ApiState {
        ApiState::new(StateStore::open_in_memory().unwrap(), DrainConfig::default())
    }

    fn hyperopt() -> CreateExperimentRequest {
        CreateExperimentRequest {
            experiment: NewExperiment {
                name: "fraud-detection-hyperopt".to_string(),
                model: "fraud-detection".to_string(),
                config: Default::default(),
            },
            queued: false,
        }
    }

    fn good_metrics() -> ExperimentMetrics {
        ExperimentMetrics {
            accuracy: 96.2,
            precision: 94.1,
            recall: 89.7,
            f1: 91.8,
        }
    }

    #[tokio::test]
    async fn create_starts_running() {
        let state = test_state();
        let resp = create_experiment(State(state.clone()), Json(hyperopt())).await;
        assert_eq!(resp.into_response().status(), StatusCode::CREATED);

        let listed = state.experiments.list(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].metrics.is_none());
    }

    #[tokio::test]
    async fn queued_flag_enqueues() {
        let state = test_state();
        let mut req = hyperopt();
        req.queued = true;
        create_experiment(State(state.clone()), Json(req)).await;

        let record = &state.experiments.list(None).unwrap()[0];
        let resp = launch_experiment(State(state), Path(record.id.clone())).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn complete_then_complete_again_is_conflict() {
        let state = test_state();
        let record = state
            .experiments
            .start(hyperopt().experiment)
            .unwrap();

        let resp = complete_experiment(
            State(state.clone()),
            Path(record.id.clone()),
            Json(good_metrics()),
        )
        .await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);

        let resp =
            complete_experiment(State(state), Path(record.id), Json(good_metrics())).await;
        assert_eq!(resp.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn fail_records_reason() {
        let state = test_state();
        let record = state
            .experiments
            .start(hyperopt().experiment)
            .unwrap();

        let resp = fail_experiment(
            State(state.clone()),
            Path(record.id.clone()),
            Json(FailRequest {
                reason: "out of memory".to_string(),
            }),
        )
        .await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);

        let record = state.experiments.get(&record.id).unwrap();
        assert_eq!(record.failure_reason.as_deref(), Some("out of memory"));
    }

    #[tokio::test]
    async fn unknown_experiment_is_not_found() {
        let state = test_state();
        let resp = get_experiment(State(state), Path("exp-99".to_string())).await;
        assert_eq!(resp.into_response().status(), StatusCode::NOT_FOUND);
    }
}
