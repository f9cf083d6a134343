//! Experiment log operations.

use std::collections::HashMap;
use std::sync::PoisonError;

use modelgrid_core::epoch_millis;
use modelgrid_state::{
    ExperimentMetrics, ExperimentRecord, ExperimentStatus, KeyLocks, StateStore,
};
use serde::Deserialize;
use tracing::info;

use crate::error::{ExperimentError, ExperimentResult};

/// Input shape for creating a training run.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExperiment {
    pub name: String,
    pub model: String,
    /// Hyperparameters and other run configuration.
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

/// The experiment log service.
#[derive(Clone)]
pub struct ExperimentLog {
    store: StateStore,
    locks: KeyLocks,
}

impl ExperimentLog {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
        }
    }

    /// Create a queued run that `launch` will later promote.
    pub fn enqueue(&self, new: NewExperiment) -> ExperimentResult<ExperimentRecord> {
        self.create(new, ExperimentStatus::Queued)
    }

    /// Create a run that starts immediately.
    pub fn start(&self, new: NewExperiment) -> ExperimentResult<ExperimentRecord> {
        self.create(new, ExperimentStatus::Running)
    }

    /// Promote a queued run to running.
    pub fn launch(&self, id: &str) -> ExperimentResult<ExperimentRecord> {
        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        if record.status != ExperimentStatus::Queued {
            return Err(ExperimentError::InvalidState(format!(
                "{id} is {:?}, only queued runs can launch",
                record.status
            )));
        }
        record.status = ExperimentStatus::Running;
        record.started_at = Some(epoch_millis());
        self.store.put_experiment(&record)?;
        info!(experiment = %id, "experiment launched");
        Ok(record)
    }

    /// Finalize a running experiment with its evaluation metrics.
    pub fn complete(
        &self,
        id: &str,
        metrics: ExperimentMetrics,
    ) -> ExperimentResult<ExperimentRecord> {
        validate_metrics(&metrics)?;
        self.finish(id, ExperimentStatus::Completed, Some(metrics), None)
    }

    /// Finalize a running experiment as failed. Metrics are reported as
    /// explicit zeroes.
    pub fn fail(&self, id: &str, reason: &str) -> ExperimentResult<ExperimentRecord> {
        self.finish(
            id,
            ExperimentStatus::Failed,
            Some(ExperimentMetrics::zeroed()),
            Some(reason.to_string()),
        )
    }

    /// Get an experiment by id.
    pub fn get(&self, id: &str) -> ExperimentResult<ExperimentRecord> {
        self.store
            .get_experiment(id)?
            .ok_or_else(|| ExperimentError::NotFound(id.to_string()))
    }

    /// List runs, ordered by start time ascending (queued runs by enqueue
    /// time), optionally filtered by model.
    ///
    /// Each call reads a fresh snapshot; iterating the result has no side
    /// effects, so the listing can be restarted at will.
    pub fn list(&self, model: Option<&str>) -> ExperimentResult<Vec<ExperimentRecord>> {
        let mut records: Vec<ExperimentRecord> = self
            .store
            .list_experiments()?
            .into_iter()
            .filter(|e| model.is_none_or(|m| e.model == m))
            .collect();
        records.sort_by_key(|e| e.order_key());
        Ok(records)
    }

    fn create(
        &self,
        new: NewExperiment,
        status: ExperimentStatus,
    ) -> ExperimentResult<ExperimentRecord> {
        if new.name.trim().is_empty() {
            return Err(ExperimentError::Validation("name must not be empty".into()));
        }
        let seq = self.store.next_seq("experiment")?;
        let now = epoch_millis();
        let record = ExperimentRecord {
            id: format!("exp-{seq}"),
            name: new.name,
            model: new.model,
            status,
            metrics: None,
            failure_reason: None,
            config: new.config,
            enqueued_at: now,
            started_at: (status == ExperimentStatus::Running).then_some(now),
            finished_at: None,
            duration_ms: None,
            seq,
        };
        self.store.put_experiment(&record)?;
        info!(experiment = %record.id, model = %record.model, ?status, "experiment created");
        Ok(record)
    }

    fn finish(
        &self,
        id: &str,
        status: ExperimentStatus,
        metrics: Option<ExperimentMetrics>,
        failure_reason: Option<String>,
    ) -> ExperimentResult<ExperimentRecord> {
        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        if record.status != ExperimentStatus::Running {
            return Err(ExperimentError::InvalidState(format!(
                "{id} is {:?}, only running experiments can finish",
                record.status
            )));
        }
        let now = epoch_millis();
        record.status = status;
        record.metrics = metrics;
        record.failure_reason = failure_reason;
        record.finished_at = Some(now);
        record.duration_ms = record.started_at.map(|s| now.saturating_sub(s));
        self.store.put_experiment(&record)?;
        info!(experiment = %id, ?status, "experiment finished");
        Ok(record)
    }
}

fn validate_metrics(metrics: &ExperimentMetrics) -> ExperimentResult<()> {
    for (label, value) in [
        ("accuracy", metrics.accuracy),
        ("precision", metrics.precision),
        ("recall", metrics.recall),
        ("f1", metrics.f1),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(ExperimentError::Validation(format!(
                "{label} {value} outside 0..=100"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_log() -> ExperimentLog {
        ExperimentLog::new(StateStore::open_in_memory().unwrap())
    }

    fn hyperopt(model: &str) -> NewExperiment {
        NewExperiment {
            name: format!("{model}-hyperopt"),
            model: model.to_string(),
            config: HashMap::from([(
                "n_estimators".to_string(),
                serde_json::Value::from(100),
            )]),
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

    #[test]
    fn start_creates_running_without_metrics() {
        let log = test_log();
        let record = log.start(hyperopt("fraud-detection")).unwrap();

        assert_eq!(record.status, ExperimentStatus::Running);
        assert!(record.metrics.is_none());
        assert!(record.started_at.is_some());
        assert!(record.duration_ms.is_none());
    }

    #[test]
    fn complete_finalizes_metrics_and_duration() {
        let log = test_log();
        let record = log.start(hyperopt("fraud-detection")).unwrap();

        let record = log.complete(&record.id, good_metrics()).unwrap();
        assert_eq!(record.status, ExperimentStatus::Completed);
        assert_eq!(record.metrics, Some(good_metrics()));
        assert!(record.finished_at.is_some());
        assert!(record.duration_ms.is_some());
    }

    #[test]
    fn terminal_records_are_immutable() {
        let log = test_log();
        let record = log.start(hyperopt("fraud-detection")).unwrap();
        log.complete(&record.id, good_metrics()).unwrap();

        assert!(matches!(
            log.complete(&record.id, good_metrics()),
            Err(ExperimentError::InvalidState(_))
        ));
        assert!(matches!(
            log.fail(&record.id, "late failure"),
            Err(ExperimentError::InvalidState(_))
        ));
    }

    #[test]
    fn fail_reports_explicit_zeroes() {
        let log = test_log();
        let record = log.start(hyperopt("recommendation-engine")).unwrap();

        let record = log.fail(&record.id, "out of memory").unwrap();
        assert_eq!(record.status, ExperimentStatus::Failed);
        assert_eq!(record.metrics, Some(ExperimentMetrics::zeroed()));
        assert_eq!(record.failure_reason.as_deref(), Some("out of memory"));
    }

    #[test]
    fn queued_runs_must_launch_before_finishing() {
        let log = test_log();
        let record = log.enqueue(hyperopt("churn")).unwrap();
        assert_eq!(record.status, ExperimentStatus::Queued);
        assert!(record.started_at.is_none());

        assert!(matches!(
            log.complete(&record.id, good_metrics()),
            Err(ExperimentError::InvalidState(_))
        ));

        let record = log.launch(&record.id).unwrap();
        assert_eq!(record.status, ExperimentStatus::Running);
        assert!(record.started_at.is_some());

        // Launching twice is rejected.
        assert!(matches!(
            log.launch(&record.id),
            Err(ExperimentError::InvalidState(_))
        ));

        log.complete(&record.id, good_metrics()).unwrap();
    }

    #[test]
    fn complete_validates_metric_ranges() {
        let log = test_log();
        let record = log.start(hyperopt("fraud")).unwrap();

        let mut bad = good_metrics();
        bad.recall = 101.0;
        assert!(matches!(
            log.complete(&record.id, bad),
            Err(ExperimentError::Validation(_))
        ));
        // Still running after the rejected call.
        assert_eq!(
            log.get(&record.id).unwrap().status,
            ExperimentStatus::Running
        );
    }

    #[test]
    fn unknown_id_is_not_found() {
        let log = test_log();
        assert!(matches!(
            log.complete("exp-99", good_metrics()),
            Err(ExperimentError::NotFound(_))
        ));
    }

    #[test]
    fn list_orders_by_start_time_and_restarts_cleanly() {
        let log = test_log();
        let a = log.start(hyperopt("fraud")).unwrap();
        let b = log.start(hyperopt("churn")).unwrap();
        let c = log.start(hyperopt("fraud")).unwrap();

        let listed = log.list(None).unwrap();
        let ids: Vec<&str> = listed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);

        // Restartable: a second listing sees the same snapshot.
        assert_eq!(log.list(None).unwrap(), listed);

        let fraud_only = log.list(Some("fraud")).unwrap();
        assert_eq!(fraud_only.len(), 2);
        assert!(fraud_only.iter().all(|e| e.model == "fraud"));
    }

    #[test]
    fn config_roundtrips() {
        let log = test_log();
        let record = log.start(hyperopt("fraud")).unwrap();

        let fetched = log.get(&record.id).unwrap();
        assert_eq!(
            fetched.config.get("n_estimators"),
            Some(&serde_json::Value::from(100))
        );
    }
}
