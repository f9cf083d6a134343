//! modelgrid-api — REST API for the modelgrid control plane.
//!
//! Provides axum route handlers for the four stores. Responses use a
//! `{success, data, error}` envelope; errors map to the status codes in
//! `response`.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/models` | List models (`?stage=` filter) |
//! | POST | `/api/v1/models` | Register a model version |
//! | GET | `/api/v1/models/{id}` | Get a model with usage counts |
//! | POST | `/api/v1/models/{id}/promote` | Move one stage forward |
//! | POST | `/api/v1/models/{id}/rollback` | Move one stage back |
//! | POST | `/api/v1/models/{id}/retrain` | Record a retrain |
//! | POST | `/api/v1/models/{id}/archive` | Archive (soft delete) |
//! | GET | `/api/v1/deployments` | List deployments (`?model=`, `?environment=`) |
//! | POST | `/api/v1/deployments` | Deploy under the traffic budget |
//! | GET | `/api/v1/deployments/{id}` | Get deployment details |
//! | POST | `/api/v1/deployments/{id}/drain` | Start the drain ramp |
//! | POST | `/api/v1/deployments/{id}/pause` | Suspend traffic |
//! | POST | `/api/v1/deployments/{id}/resume` | Restore traffic |
//! | POST | `/api/v1/deployments/{id}/rollback` | Fast drain |
//! | PUT | `/api/v1/deployments/{id}/metrics` | Overwrite resource snapshot |
//! | GET | `/api/v1/experiments` | List runs (`?model=` filter) |
//! | POST | `/api/v1/experiments` | Start (or enqueue) a run |
//! | GET | `/api/v1/experiments/{id}` | Get run details |
//! | POST | `/api/v1/experiments/{id}/launch` | Promote a queued run |
//! | POST | `/api/v1/experiments/{id}/complete` | Finalize with metrics |
//! | POST | `/api/v1/experiments/{id}/fail` | Finalize as failed |
//! | GET | `/api/v1/alerts` | List alerts (`?active=true` filter) |
//! | POST | `/api/v1/alerts` | Raise an alert |
//! | POST | `/api/v1/alerts/{id}/acknowledge` | Acknowledge once |
//! | GET | `/api/v1/overview` | Dashboard counts |

pub mod alert_handlers;
pub mod deploy_handlers;
pub mod experiment_handlers;
pub mod model_handlers;
pub mod response;

use axum::Router;
use axum::routing::{get, post, put};
use modelgrid_alert::AlertFeed;
use modelgrid_core::config::DrainConfig;
use modelgrid_deploy::DeploymentTracker;
use modelgrid_experiment::ExperimentLog;
use modelgrid_registry::ModelRegistry;
use modelgrid_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: ModelRegistry,
    pub tracker: DeploymentTracker,
    pub experiments: ExperimentLog,
    pub alerts: AlertFeed,
    pub drain: DrainConfig,
}

impl ApiState {
    /// Wire all services over one shared store.
    pub fn new(store: StateStore, drain: DrainConfig) -> Self {
        Self {
            registry: ModelRegistry::new(store.clone()),
            tracker: DeploymentTracker::new(store.clone()),
            experiments: ExperimentLog::new(store.clone()),
            alerts: AlertFeed::new(store),
            drain,
        }
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/models",
            get(model_handlers::list_models).post(model_handlers::register_model),
        )
        .route("/models/{id}", get(model_handlers::get_model))
        .route("/models/{id}/promote", post(model_handlers::promote_model))
        .route("/models/{id}/rollback", post(model_handlers::rollback_model))
        .route("/models/{id}/retrain", post(model_handlers::retrain_model))
        .route("/models/{id}/archive", post(model_handlers::archive_model))
        .route(
            "/deployments",
            get(deploy_handlers::list_deployments).post(deploy_handlers::create_deployment),
        )
        .route("/deployments/{id}", get(deploy_handlers::get_deployment))
        .route("/deployments/{id}/drain", post(deploy_handlers::drain_deployment))
        .route("/deployments/{id}/pause", post(deploy_handlers::pause_deployment))
        .route("/deployments/{id}/resume", post(deploy_handlers::resume_deployment))
        .route(
            "/deployments/{id}/rollback",
            post(deploy_handlers::rollback_deployment),
        )
        .route(
            "/deployments/{id}/metrics",
            put(deploy_handlers::record_deployment_metrics),
        )
        .route(
            "/experiments",
            get(experiment_handlers::list_experiments)
                .post(experiment_handlers::create_experiment),
        )
        .route("/experiments/{id}", get(experiment_handlers::get_experiment))
        .route(
            "/experiments/{id}/launch",
            post(experiment_handlers::launch_experiment),
        )
        .route(
            "/experiments/{id}/complete",
            post(experiment_handlers::complete_experiment),
        )
        .route("/experiments/{id}/fail", post(experiment_handlers::fail_experiment))
        .route(
            "/alerts",
            get(alert_handlers::list_alerts).post(alert_handlers::raise_alert),
        )
        .route(
            "/alerts/{id}/acknowledge",
            post(alert_handlers::acknowledge_alert),
        )
        .route("/overview", get(model_handlers::overview))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
