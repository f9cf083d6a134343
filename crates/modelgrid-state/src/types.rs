//! Domain records for the modelgrid state store.
//!
//! These are the persisted shapes of the four entities the dashboard
//! renders. All types serialize to/from JSON for storage in redb tables
//! and for the REST API, with enum spellings matching the wire format
//! (`blue-green`, `drift`, ...).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a registered model.
pub type ModelId = String;

/// Unique identifier for a deployment.
pub type DeploymentId = String;

/// Unique identifier for an experiment run.
pub type ExperimentId = String;

/// Unique identifier for an alert.
pub type AlertId = String;

// ── Models ────────────────────────────────────────────────────────

/// Lifecycle stage of a model (also used as deployment environment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Development,
    Staging,
    Production,
}

impl Stage {
    /// The single forward step in the progression rule, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Development => Some(Stage::Staging),
            Stage::Staging => Some(Stage::Production),
            Stage::Production => None,
        }
    }

    /// The single backward step (explicit rollback only), if any.
    pub fn previous(self) -> Option<Stage> {
        match self {
            Stage::Development => None,
            Stage::Staging => Some(Stage::Development),
            Stage::Production => Some(Stage::Staging),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Development => "development",
            Stage::Staging => "staging",
            Stage::Production => "production",
        };
        f.write_str(s)
    }
}

/// A registered model version with its lifecycle stage and accuracy snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelRecord {
    pub id: ModelId,
    pub name: String,
    /// Semantic version string, validated on registration.
    pub version: String,
    /// Spelled `status` on the wire, the shape the dashboard reads.
    #[serde(rename = "status")]
    pub stage: Stage,
    /// Accuracy snapshot in percent (0–100). Recorded, never recomputed.
    pub accuracy: f64,
    /// Unix timestamp (ms) of registration.
    pub created_at: u64,
    /// Unix timestamp (ms) of the last stage change or retrain.
    pub last_updated: u64,
    /// Soft-delete flag. Models are archived, never removed.
    pub archived: bool,
    /// Allocation order, id source and ordering tiebreaker.
    pub seq: u64,
    /// Bumped on every write; total order of recency.
    pub revision: u64,
}

// ── Deployments ───────────────────────────────────────────────────

/// Rollout strategy a deployment was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployStrategy {
    BlueGreen,
    Canary,
    Rolling,
}

/// Runtime health of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Healthy,
    Draining,
    Unhealthy,
}

/// Active traffic ramp-down. Present only while status is `Draining`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DrainState {
    /// Unix timestamp (ms) the drain started.
    pub started_at: u64,
    /// Total ramp duration in milliseconds.
    pub duration_ms: u64,
    /// Traffic percentage when the drain started.
    pub initial_traffic: f64,
}

/// A running deployment of a model into an environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    /// Name of the deployed model (reference, not ownership).
    pub model_name: String,
    pub environment: Stage,
    pub strategy: DeployStrategy,
    pub status: DeploymentStatus,
    /// Share of the (model, environment) traffic budget, 0–100.
    pub traffic: f64,
    pub instances: u32,
    /// CPU usage percent, 0–100. Latest snapshot only.
    pub cpu: f64,
    /// Memory usage percent, 0–100. Latest snapshot only.
    pub memory: f64,
    pub requests_per_min: u64,
    /// True while traffic is suspended by a pause.
    pub paused: bool,
    /// Traffic to restore on resume.
    pub resume_traffic: Option<f64>,
    pub drain: Option<DrainState>,
    pub created_at: u64,
    pub updated_at: u64,
    pub seq: u64,
}

impl DeploymentRecord {
    /// Key of the traffic budget this deployment draws from.
    pub fn budget_key(&self) -> String {
        budget_key(&self.model_name, self.environment)
    }
}

/// Composite key for a (model, environment) traffic budget.
pub fn budget_key(model_name: &str, environment: Stage) -> String {
    format!("{model_name}/{environment}")
}

// ── Experiments ───────────────────────────────────────────────────

/// Lifecycle status of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl ExperimentStatus {
    /// Terminal records are immutable.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExperimentStatus::Completed | ExperimentStatus::Failed)
    }
}

/// Final evaluation metrics of a training run, all in percent (0–100).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExperimentMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ExperimentMetrics {
    /// The explicit all-zero metrics a failed run reports.
    pub fn zeroed() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        }
    }
}

/// One training run in the append-only experiment log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRecord {
    pub id: ExperimentId,
    pub name: String,
    /// Name of the model under training (reference, not ownership).
    pub model: String,
    pub status: ExperimentStatus,
    /// None until the run reaches a terminal status.
    pub metrics: Option<ExperimentMetrics>,
    pub failure_reason: Option<String>,
    /// Hyperparameters and other run configuration.
    pub config: HashMap<String, serde_json::Value>,
    pub enqueued_at: u64,
    pub started_at: Option<u64>,
    pub finished_at: Option<u64>,
    pub duration_ms: Option<u64>,
    pub seq: u64,
}

impl ExperimentRecord {
    /// Sort key for "ordered by start time ascending"; queued runs order
    /// by enqueue time.
    pub fn order_key(&self) -> (u64, u64) {
        (self.started_at.unwrap_or(self.enqueued_at), self.seq)
    }
}

// ── Alerts ────────────────────────────────────────────────────────

/// What kind of anomaly a detection rule flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Drift,
    Performance,
    System,
}

/// Assigned at creation, never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

/// One entry in the time-ordered alert feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    pub id: AlertId,
    /// Spelled `type` on the wire; `type` is reserved in Rust.
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    /// Name of the model concerned (reference, not ownership).
    pub model: String,
    pub raised_at: u64,
    /// Set by the single allowed acknowledgement.
    pub acknowledged_at: Option<u64>,
    pub seq: u64,
}

impl AlertRecord {
    pub fn is_active(&self) -> bool {
        self.acknowledged_at.is_none()
    }
}
