//! Model registry operations.

use std::sync::PoisonError;

use modelgrid_core::epoch_millis;
use modelgrid_state::{KeyLocks, ModelRecord, Stage, StateStore};
use serde::Deserialize;
use tracing::info;

use crate::error::{RegistryError, RegistryResult};

/// Input shape for registering a model version.
#[derive(Debug, Clone, Deserialize)]
pub struct NewModel {
    pub name: String,
    pub version: String,
    #[serde(rename = "status")]
    pub stage: Stage,
    pub accuracy: f64,
}

/// The model registry service.
///
/// Read-check-write sequences on the same model id are serialized via
/// per-key locks; redb gives readers the last committed snapshot.
#[derive(Clone)]
pub struct ModelRegistry {
    store: StateStore,
    locks: KeyLocks,
}

impl ModelRegistry {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
        }
    }

    /// Register a new model version.
    ///
    /// The version must parse as a semantic version and accuracy must be
    /// a percentage. Returns the stored record with its generated id.
    pub fn register(&self, new: NewModel) -> RegistryResult<ModelRecord> {
        if new.name.trim().is_empty() {
            return Err(RegistryError::Validation("name must not be empty".into()));
        }
        validate_version(&new.version)?;
        validate_accuracy(new.accuracy)?;

        let seq = self.store.next_seq("model")?;
        let now = epoch_millis();
        let record = ModelRecord {
            id: format!("model-{seq}"),
            name: new.name,
            version: new.version,
            stage: new.stage,
            accuracy: new.accuracy,
            created_at: now,
            last_updated: now,
            archived: false,
            seq,
            revision: self.store.next_seq("revision")?,
        };
        self.store.put_model(&record)?;
        info!(model = %record.id, name = %record.name, stage = %record.stage, "model registered");
        Ok(record)
    }

    /// Get a model by id.
    pub fn get(&self, id: &str) -> RegistryResult<ModelRecord> {
        self.store
            .get_model(id)?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// List non-archived models, most recently updated first, optionally
    /// filtered by stage.
    pub fn list(&self, stage: Option<Stage>) -> RegistryResult<Vec<ModelRecord>> {
        let mut models: Vec<ModelRecord> = self
            .store
            .list_models()?
            .into_iter()
            .filter(|m| !m.archived)
            .filter(|m| stage.is_none_or(|s| m.stage == s))
            .collect();
        // revision breaks wall-clock ties, so the order is total.
        models.sort_by(|a, b| {
            (b.last_updated, b.revision).cmp(&(a.last_updated, a.revision))
        });
        Ok(models)
    }

    /// List every model, archived included. Same ordering as `list`.
    pub fn list_all(&self) -> RegistryResult<Vec<ModelRecord>> {
        let mut models = self.store.list_models()?;
        models.sort_by(|a, b| {
            (b.last_updated, b.revision).cmp(&(a.last_updated, a.revision))
        });
        Ok(models)
    }

    /// Move a model to a new stage.
    ///
    /// Only the single forward step is reachable: development → staging →
    /// production. Anything else (skips, backward moves, archived models)
    /// is rejected; backward moves go through `rollback`.
    pub fn update_stage(&self, id: &str, new_stage: Stage) -> RegistryResult<ModelRecord> {
        self.transition(id, |record| {
            if record.stage.next() == Some(new_stage) {
                Ok(new_stage)
            } else {
                Err(RegistryError::InvalidTransition(format!(
                    "{} -> {} (forward progression allows only {} -> {})",
                    record.stage,
                    new_stage,
                    record.stage,
                    record
                        .stage
                        .next()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "nothing".into()),
                )))
            }
        })
    }

    /// Explicitly roll a model back one stage.
    pub fn rollback(&self, id: &str) -> RegistryResult<ModelRecord> {
        self.transition(id, |record| {
            record.stage.previous().ok_or_else(|| {
                RegistryError::InvalidTransition(format!(
                    "{} has no stage to roll back to",
                    record.stage
                ))
            })
        })
    }

    /// Record a retrain: new version and a fresh accuracy snapshot.
    pub fn record_retrain(
        &self,
        id: &str,
        version: &str,
        accuracy: f64,
    ) -> RegistryResult<ModelRecord> {
        validate_version(version)?;
        validate_accuracy(accuracy)?;

        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        if record.archived {
            return Err(RegistryError::Validation(format!("{id} is archived")));
        }
        record.version = version.to_string();
        record.accuracy = accuracy;
        self.touch(&mut record)?;
        info!(model = %record.id, version = %record.version, "retrain recorded");
        Ok(record)
    }

    /// Archive a model. Archived models are hidden from `list` and refuse
    /// further transitions; the record itself is never removed.
    pub fn archive(&self, id: &str) -> RegistryResult<ModelRecord> {
        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        record.archived = true;
        self.touch(&mut record)?;
        info!(model = %record.id, "model archived");
        Ok(record)
    }

    fn transition(
        &self,
        id: &str,
        target: impl FnOnce(&ModelRecord) -> RegistryResult<Stage>,
    ) -> RegistryResult<ModelRecord> {
        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        if record.archived {
            return Err(RegistryError::InvalidTransition(format!(
                "{id} is archived"
            )));
        }
        let new_stage = target(&record)?;
        let old_stage = record.stage;
        record.stage = new_stage;
        self.touch(&mut record)?;
        info!(model = %record.id, from = %old_stage, to = %new_stage, "stage changed");
        Ok(record)
    }

    fn touch(&self, record: &mut ModelRecord) -> RegistryResult<()> {
        record.last_updated = epoch_millis();
        record.revision = self.store.next_seq("revision")?;
        self.store.put_model(record)?;
        Ok(())
    }
}

fn validate_version(version: &str) -> RegistryResult<()> {
    semver::Version::parse(version)
        .map(|_| ())
        .map_err(|e| RegistryError::Validation(format!("version {version:?}: {e}")))
}

fn validate_accuracy(accuracy: f64) -> RegistryResult<()> {
    if !(0.0..=100.0).contains(&accuracy) {
        return Err(RegistryError::Validation(format!(
            "accuracy {accuracy} outside 0..=100"
        )));
    }
    Ok(())
}
