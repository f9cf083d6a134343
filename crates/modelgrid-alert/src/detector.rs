//! Detection rules — the process that raises alerts.
//!
//! Pull-based: each evaluation reads the current store snapshots and
//! raises at most one alert per (kind, model) until the previous one is
//! acknowledged.

use std::time::Duration;

use modelgrid_deploy::DeploymentTracker;
use modelgrid_state::{
    AlertKind, AlertRecord, AlertSeverity, DeploymentStatus, ExperimentStatus, StateStore,
};
use tokio::sync::watch;
use tracing::{error, info};

use crate::feed::AlertFeed;

/// Thresholds the rules evaluate against.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DetectionRules {
    /// Performance rule: alert when a model's accuracy snapshot is below this.
    pub accuracy_floor: f64,
    /// Drift rule: alert when the latest completed experiment accuracy
    /// diverges from the model snapshot by more than this many points.
    pub drift_threshold: f64,
    /// System rule: alert when deployment CPU usage exceeds this.
    pub cpu_high_watermark: f64,
    /// System rule: alert when deployment memory usage exceeds this.
    pub memory_high_watermark: f64,
}

impl Default for DetectionRules {
    fn default() -> Self {
        Self {
            accuracy_floor: 85.0,
            drift_threshold: 5.0,
            cpu_high_watermark: 90.0,
            memory_high_watermark: 90.0,
        }
    }
}

/// Evaluates the detection rules and feeds the alert stream.
pub struct Detector {
    store: StateStore,
    feed: AlertFeed,
    tracker: DeploymentTracker,
    rules: DetectionRules,
}

impl Detector {
    pub fn new(
        store: StateStore,
        feed: AlertFeed,
        tracker: DeploymentTracker,
        rules: DetectionRules,
    ) -> Self {
        Self {
            store,
            feed,
            tracker,
            rules,
        }
    }

    /// Run all rules once. Returns the alerts raised this round.
    pub fn evaluate(&self) -> anyhow::Result<Vec<AlertRecord>> {
        let mut raised = Vec::new();
        self.check_models(&mut raised)?;
        self.check_deployments(&mut raised)?;
        Ok(raised)
    }

    /// Performance and drift rules over registered models.
    fn check_models(&self, raised: &mut Vec<AlertRecord>) -> anyhow::Result<()> {
        let experiments = self.store.list_experiments()?;

        for model in self.store.list_models()? {
            if model.archived {
                continue;
            }

            if model.accuracy < self.rules.accuracy_floor
                && !self.feed.has_active(AlertKind::Performance, &model.name)?
            {
                let severity = if self.rules.accuracy_floor - model.accuracy >= 10.0 {
                    AlertSeverity::High
                } else {
                    AlertSeverity::Medium
                };
                raised.push(self.feed.raise(
                    AlertKind::Performance,
                    severity,
                    &format!(
                        "Model accuracy dropped below threshold ({:.0}%)",
                        self.rules.accuracy_floor
                    ),
                    &model.name,
                )?);
            }

            // Latest completed run is the reference the snapshot drifted from.
            let latest = experiments
                .iter()
                .filter(|e| e.model == model.name && e.status == ExperimentStatus::Completed)
                .max_by_key(|e| (e.finished_at, e.seq));
            if let Some(exp) = latest {
                let exp_accuracy = exp.metrics.map(|m| m.accuracy).unwrap_or(0.0);
                if (exp_accuracy - model.accuracy).abs() > self.rules.drift_threshold
                    && !self.feed.has_active(AlertKind::Drift, &model.name)?
                {
                    raised.push(self.feed.raise(
                        AlertKind::Drift,
                        AlertSeverity::High,
                        &format!("Data drift detected in {}", model.name),
                        &model.name,
                    )?);
                }
            }
        }
        Ok(())
    }

    /// System rule over deployment resource snapshots, flipping health
    /// on breach and recovery.
    fn check_deployments(&self, raised: &mut Vec<AlertRecord>) -> anyhow::Result<()> {
        for dep in self.store.list_deployments()? {
            let cpu_hot = dep.cpu > self.rules.cpu_high_watermark;
            let memory_hot = dep.memory > self.rules.memory_high_watermark;

            if cpu_hot || memory_hot {
                let resource = if memory_hot { "memory" } else { "CPU" };
                self.tracker
                    .mark_unhealthy(&dep.id, &format!("{resource} above watermark"))?;
                if !self.feed.has_active(AlertKind::System, &dep.model_name)? {
                    let severity = if dep.cpu.max(dep.memory) >= 97.0 {
                        AlertSeverity::High
                    } else {
                        AlertSeverity::Low
                    };
                    raised.push(self.feed.raise(
                        AlertKind::System,
                        severity,
                        &format!(
                            "High {resource} usage in {} environment",
                            dep.environment
                        ),
                        &dep.model_name,
                    )?);
                }
            } else if dep.status == DeploymentStatus::Unhealthy {
                self.tracker.mark_healthy(&dep.id)?;
            }
        }
        Ok(())
    }

    /// Run the evaluation loop until shutdown signal.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "detector started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.evaluate() {
                        Ok(raised) if !raised.is_empty() => {
                            info!(count = raised.len(), "detection rules raised alerts");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "detection evaluation failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("detector shutting down");
                    break;
                }
            }
        }
    }
}
