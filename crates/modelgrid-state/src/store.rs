//! StateStore — redb-backed persistence for modelgrid.
//!
//! Typed CRUD over models, deployments, experiments, and alerts. All
//! values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(MODELS).map_err(map_err!(Table))?;
        txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        txn.open_table(EXPERIMENTS).map_err(map_err!(Table))?;
        txn.open_table(ALERTS).map_err(map_err!(Table))?;
        txn.open_table(COUNTERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record plumbing ────────────────────────────────────

    fn put<T: Serialize>(&self, table: RecordTable, key: &str, record: &T) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: RecordTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn list<T: DeserializeOwned>(&self, table: RecordTable) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: T =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    fn delete(&self, table: RecordTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Counters ───────────────────────────────────────────────────

    /// Allocate the next value of a named monotonic counter.
    ///
    /// The increment happens inside a single write transaction, so
    /// allocated values are unique and survive reload.
    pub fn next_seq(&self, counter: &str) -> StateResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let next;
        {
            let mut table = txn.open_table(COUNTERS).map_err(map_err!(Table))?;
            let current = table
                .get(counter)
                .map_err(map_err!(Read))?
                .map(|g| g.value())
                .unwrap_or(0);
            next = current + 1;
            table.insert(counter, next).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(next)
    }

    // ── Models ─────────────────────────────────────────────────────

    /// Insert or update a model record.
    pub fn put_model(&self, record: &ModelRecord) -> StateResult<()> {
        self.put(MODELS, &record.id, record)?;
        debug!(model = %record.id, "model stored");
        Ok(())
    }

    /// Get a model by id.
    pub fn get_model(&self, id: &str) -> StateResult<Option<ModelRecord>> {
        self.get(MODELS, id)
    }

    /// List all model records, archived included. Unordered.
    pub fn list_models(&self) -> StateResult<Vec<ModelRecord>> {
        self.list(MODELS)
    }

    // ── Deployments ────────────────────────────────────────────────

    /// Insert or update a deployment record.
    pub fn put_deployment(&self, record: &DeploymentRecord) -> StateResult<()> {
        self.put(DEPLOYMENTS, &record.id, record)?;
        debug!(deployment = %record.id, "deployment stored");
        Ok(())
    }

    /// Get a deployment by id.
    pub fn get_deployment(&self, id: &str) -> StateResult<Option<DeploymentRecord>> {
        self.get(DEPLOYMENTS, id)
    }

    /// List all deployment records. Unordered.
    pub fn list_deployments(&self) -> StateResult<Vec<DeploymentRecord>> {
        self.list(DEPLOYMENTS)
    }

    /// Delete a deployment by id. Returns true if it existed.
    pub fn delete_deployment(&self, id: &str) -> StateResult<bool> {
        let existed = self.delete(DEPLOYMENTS, id)?;
        debug!(deployment = %id, existed, "deployment deleted");
        Ok(existed)
    }

    // ── Experiments ────────────────────────────────────────────────

    /// Insert or update an experiment record.
    pub fn put_experiment(&self, record: &ExperimentRecord) -> StateResult<()> {
        self.put(EXPERIMENTS, &record.id, record)?;
        debug!(experiment = %record.id, "experiment stored");
        Ok(())
    }

    /// Get an experiment by id.
    pub fn get_experiment(&self, id: &str) -> StateResult<Option<ExperimentRecord>> {
        self.get(EXPERIMENTS, id)
    }

    /// List all experiment records. Unordered.
    pub fn list_experiments(&self) -> StateResult<Vec<ExperimentRecord>> {
        self.list(EXPERIMENTS)
    }

    // ── Alerts ─────────────────────────────────────────────────────

    /// Insert or update an alert record.
    pub fn put_alert(&self, record: &AlertRecord) -> StateResult<()> {
        self.put(ALERTS, &record.id, record)?;
        debug!(alert = %record.id, "alert stored");
        Ok(())
    }

    /// Get an alert by id.
    pub fn get_alert(&self, id: &str) -> StateResult<Option<AlertRecord>> {
        self.get(ALERTS, id)
    }

    /// List all alert records. Unordered.
    pub fn list_alerts(&self) -> StateResult<Vec<AlertRecord>> {
        self.list(ALERTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_model(id: &str, name: &str, seq: u64) -> ModelRecord {
        ModelRecord {
            id: id.to_string(),
            name: name.to_string(),
            version: "1.0.0".to_string(),
            stage: Stage::Development,
            accuracy: 90.0,
            created_at: 1000,
            last_updated: 1000,
            archived: false,
            seq,
            revision: seq,
        }
    }

    fn test_deployment(id: &str, model: &str, seq: u64) -> DeploymentRecord {
        DeploymentRecord {
            id: id.to_string(),
            model_name: model.to_string(),
            environment: Stage::Production,
            strategy: DeployStrategy::Canary,
            status: DeploymentStatus::Healthy,
            traffic: 100.0,
            instances: 3,
            cpu: 45.0,
            memory: 62.0,
            requests_per_min: 1250,
            paused: false,
            resume_traffic: None,
            drain: None,
            created_at: 1000,
            updated_at: 1000,
            seq,
        }
    }

    fn test_experiment(id: &str, model: &str, seq: u64) -> ExperimentRecord {
        ExperimentRecord {
            id: id.to_string(),
            name: format!("{model}-hyperopt"),
            model: model.to_string(),
            status: ExperimentStatus::Running,
            metrics: None,
            failure_reason: None,
            config: HashMap::new(),
            enqueued_at: 1000,
            started_at: Some(1000),
            finished_at: None,
            duration_ms: None,
            seq,
        }
    }

    fn test_alert(id: &str, model: &str, seq: u64) -> AlertRecord {
        AlertRecord {
            id: id.to_string(),
            kind: AlertKind::Drift,
            severity: AlertSeverity::High,
            message: format!("Data drift detected in {model}"),
            model: model.to_string(),
            raised_at: 1000,
            acknowledged_at: None,
            seq,
        }
    }

    // ── Model CRUD ─────────────────────────────────────────────────

    #[test]
    fn model_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_model("model-1", "fraud-detection-v2.1", 1);

        store.put_model(&record).unwrap();
        let retrieved = store.get_model("model-1").unwrap();

        assert_eq!(retrieved, Some(record));
    }

    #[test]
    fn model_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_model("model-99").unwrap().is_none());
    }

    #[test]
    fn model_update_in_place() {
        let store = StateStore::open_in_memory().unwrap();
        let mut record = test_model("model-1", "fraud-detection-v2.1", 1);
        store.put_model(&record).unwrap();

        record.stage = Stage::Staging;
        record.last_updated = 2000;
        record.revision = 5;
        store.put_model(&record).unwrap();

        let retrieved = store.get_model("model-1").unwrap().unwrap();
        assert_eq!(retrieved.stage, Stage::Staging);
        assert_eq!(retrieved.revision, 5);
    }

    #[test]
    fn model_list_all() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_model(&test_model("model-1", "fraud", 1)).unwrap();
        store.put_model(&test_model("model-2", "churn", 2)).unwrap();

        let all = store.list_models().unwrap();
        assert_eq!(all.len(), 2);
    }

    // ── Deployment CRUD ────────────────────────────────────────────

    #[test]
    fn deployment_put_get_delete() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_deployment("dep-1", "fraud-detection-v2.1", 1);

        store.put_deployment(&record).unwrap();
        assert_eq!(store.get_deployment("dep-1").unwrap(), Some(record));

        assert!(store.delete_deployment("dep-1").unwrap());
        assert!(!store.delete_deployment("dep-1").unwrap());
        assert!(store.get_deployment("dep-1").unwrap().is_none());
    }

    #[test]
    fn deployment_list_all() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_deployment(&test_deployment("dep-1", "fraud", 1))
            .unwrap();
        store
            .put_deployment(&test_deployment("dep-2", "fraud", 2))
            .unwrap();
        store
            .put_deployment(&test_deployment("dep-3", "churn", 3))
            .unwrap();

        assert_eq!(store.list_deployments().unwrap().len(), 3);
    }

    // ── Experiment CRUD ────────────────────────────────────────────

    #[test]
    fn experiment_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_experiment("exp-1", "fraud-detection", 1);

        store.put_experiment(&record).unwrap();
        assert_eq!(store.get_experiment("exp-1").unwrap(), Some(record));
    }

    #[test]
    fn experiment_terminal_fields_roundtrip() {
        let store = StateStore::open_in_memory().unwrap();
        let mut record = test_experiment("exp-1", "fraud-detection", 1);
        record.status = ExperimentStatus::Completed;
        record.metrics = Some(ExperimentMetrics {
            accuracy: 96.2,
            precision: 94.1,
            recall: 89.7,
            f1: 91.8,
        });
        record.finished_at = Some(2000);
        record.duration_ms = Some(1000);

        store.put_experiment(&record).unwrap();
        let retrieved = store.get_experiment("exp-1").unwrap().unwrap();
        assert_eq!(retrieved.metrics.unwrap().f1, 91.8);
        assert_eq!(retrieved.duration_ms, Some(1000));
    }

    // ── Alert CRUD ─────────────────────────────────────────────────

    #[test]
    fn alert_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_alert("alert-1", "fraud-detection-v2.1", 1);

        store.put_alert(&record).unwrap();
        let retrieved = store.get_alert("alert-1").unwrap().unwrap();
        assert!(retrieved.is_active());
        assert_eq!(retrieved.kind, AlertKind::Drift);
    }

    // ── Counters ───────────────────────────────────────────────────

    #[test]
    fn counters_are_monotonic_and_independent() {
        let store = StateStore::open_in_memory().unwrap();

        assert_eq!(store.next_seq("seq").unwrap(), 1);
        assert_eq!(store.next_seq("seq").unwrap(), 2);
        assert_eq!(store.next_seq("revision").unwrap(), 1);
        assert_eq!(store.next_seq("seq").unwrap(), 3);
    }

    #[test]
    fn counters_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.next_seq("seq").unwrap();
            store.next_seq("seq").unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.next_seq("seq").unwrap(), 3);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store
                .put_model(&test_model("model-1", "fraud-detection-v2.1", 1))
                .unwrap();
            store
                .put_alert(&test_alert("alert-1", "fraud-detection-v2.1", 1))
                .unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let model = store.get_model("model-1").unwrap();
        assert!(model.is_some());
        assert_eq!(model.unwrap().name, "fraud-detection-v2.1");
        assert_eq!(store.list_alerts().unwrap().len(), 1);
    }

    // ── Edge cases ─────────────────────────────────────────────────

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_models().unwrap().is_empty());
        assert!(store.list_deployments().unwrap().is_empty());
        assert!(store.list_experiments().unwrap().is_empty());
        assert!(store.list_alerts().unwrap().is_empty());
        assert!(!store.delete_deployment("dep-1").unwrap());
    }
}
