//! Deployment tracker operations.

use std::sync::PoisonError;

use modelgrid_core::epoch_millis;
use modelgrid_state::{
    budget_key, DeployStrategy, DeploymentId, DeploymentRecord, DeploymentStatus, DrainState,
    KeyLocks, Stage, StateStore,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{DeployError, DeployResult};

/// Input shape for creating a deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployRequest {
    pub model_name: String,
    pub environment: Stage,
    pub strategy: DeployStrategy,
    /// Requested share of the (model, environment) traffic budget, 0–100.
    pub traffic: f64,
    pub instances: u32,
}

/// The deployment tracker service.
#[derive(Clone)]
pub struct DeploymentTracker {
    store: StateStore,
    /// Keys: budget keys (`{model}/{environment}`) for budget-changing
    /// sequences, deployment ids for everything else.
    locks: KeyLocks,
}

impl DeploymentTracker {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
        }
    }

    /// Create a deployment, enforcing the traffic budget.
    ///
    /// Check and insert happen under the (model, environment) lock:
    /// either both the budget check and the write go through, or nothing
    /// is written.
    pub fn deploy(&self, req: DeployRequest) -> DeployResult<DeploymentRecord> {
        if !(0.0..=100.0).contains(&req.traffic) {
            return Err(DeployError::Validation(format!(
                "traffic {} outside 0..=100",
                req.traffic
            )));
        }
        if req.instances == 0 && req.traffic > 0.0 {
            return Err(DeployError::Validation(
                "a deployment with zero instances cannot take traffic".into(),
            ));
        }

        let budget = budget_key(&req.model_name, req.environment);
        let lock = self.locks.acquire(&budget);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let allocated = self.allocated_traffic(&req.model_name, req.environment)?;
        let available = 100.0 - allocated;
        if req.traffic > available {
            return Err(DeployError::TrafficOverallocation {
                budget,
                requested: req.traffic,
                available,
            });
        }

        let seq = self.store.next_seq("deployment")?;
        let now = epoch_millis();
        let record = DeploymentRecord {
            id: format!("dep-{seq}"),
            model_name: req.model_name,
            environment: req.environment,
            strategy: req.strategy,
            status: DeploymentStatus::Healthy,
            traffic: req.traffic,
            instances: req.instances,
            cpu: 0.0,
            memory: 0.0,
            requests_per_min: 0,
            paused: false,
            resume_traffic: None,
            drain: None,
            created_at: now,
            updated_at: now,
            seq,
        };
        self.store.put_deployment(&record)?;
        info!(
            deployment = %record.id,
            model = %record.model_name,
            environment = %record.environment,
            traffic = record.traffic,
            "deployment created"
        );
        Ok(record)
    }

    /// Get a deployment by id.
    pub fn get(&self, id: &str) -> DeployResult<DeploymentRecord> {
        self.store
            .get_deployment(id)?
            .ok_or_else(|| DeployError::NotFound(id.to_string()))
    }

    /// List deployments in creation order, optionally filtered.
    pub fn list(
        &self,
        model_name: Option<&str>,
        environment: Option<Stage>,
    ) -> DeployResult<Vec<DeploymentRecord>> {
        let mut records: Vec<DeploymentRecord> = self
            .store
            .list_deployments()?
            .into_iter()
            .filter(|d| model_name.is_none_or(|m| d.model_name == m))
            .filter(|d| environment.is_none_or(|e| d.environment == e))
            .collect();
        records.sort_by_key(|d| d.seq);
        Ok(records)
    }

    /// Start draining: traffic ramps linearly to zero over `ramp_ms`,
    /// after which the deployment is removed.
    pub fn drain(&self, id: &str, ramp_ms: u64) -> DeployResult<DeploymentRecord> {
        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        if record.status == DeploymentStatus::Draining {
            return Err(DeployError::InvalidState(format!(
                "{id} is already draining"
            )));
        }
        record.status = DeploymentStatus::Draining;
        record.drain = Some(DrainState {
            started_at: epoch_millis(),
            duration_ms: ramp_ms,
            initial_traffic: record.traffic,
        });
        record.updated_at = epoch_millis();
        self.store.put_deployment(&record)?;
        info!(deployment = %id, ramp_ms, "drain started");
        Ok(record)
    }

    /// Roll a deployment back: drain on the (shorter) rollback ramp.
    pub fn rollback(&self, id: &str, ramp_ms: u64) -> DeployResult<DeploymentRecord> {
        let record = self.drain(id, ramp_ms)?;
        warn!(deployment = %id, "deployment rolled back");
        Ok(record)
    }

    /// Suspend traffic, remembering the prior share for `resume`.
    pub fn pause(&self, id: &str) -> DeployResult<DeploymentRecord> {
        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        if record.status == DeploymentStatus::Draining {
            return Err(DeployError::InvalidState(format!("{id} is draining")));
        }
        if record.paused {
            return Err(DeployError::InvalidState(format!("{id} is already paused")));
        }
        record.resume_traffic = Some(record.traffic);
        record.traffic = 0.0;
        record.paused = true;
        record.updated_at = epoch_millis();
        self.store.put_deployment(&record)?;
        info!(deployment = %id, "deployment paused");
        Ok(record)
    }

    /// Restore a paused deployment's traffic.
    ///
    /// The budget may have been taken by other deployments in the
    /// meantime, so the check runs again under the same budget lock
    /// `deploy` uses.
    pub fn resume(&self, id: &str) -> DeployResult<DeploymentRecord> {
        let record = self.get(id)?;
        let budget_lock = self.locks.acquire(&record.budget_key());
        let _budget_guard = budget_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let id_lock = self.locks.acquire(id);
        let _id_guard = id_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Re-read under the locks.
        let mut record = self.get(id)?;
        if !record.paused {
            return Err(DeployError::InvalidState(format!("{id} is not paused")));
        }
        let restore = record.resume_traffic.unwrap_or(0.0);
        let allocated = self.allocated_traffic(&record.model_name, record.environment)?;
        let available = 100.0 - allocated;
        if restore > available {
            return Err(DeployError::TrafficOverallocation {
                budget: record.budget_key(),
                requested: restore,
                available,
            });
        }
        record.traffic = restore;
        record.paused = false;
        record.resume_traffic = None;
        record.updated_at = epoch_millis();
        self.store.put_deployment(&record)?;
        info!(deployment = %id, traffic = restore, "deployment resumed");
        Ok(record)
    }

    /// Overwrite the latest resource snapshot. No history is kept.
    pub fn record_metrics(
        &self,
        id: &str,
        cpu: f64,
        memory: f64,
        requests_per_min: u64,
    ) -> DeployResult<DeploymentRecord> {
        for (label, value) in [("cpu", cpu), ("memory", memory)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(DeployError::Validation(format!(
                    "{label} {value} outside 0..=100"
                )));
            }
        }

        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        record.cpu = cpu;
        record.memory = memory;
        record.requests_per_min = requests_per_min;
        record.updated_at = epoch_millis();
        self.store.put_deployment(&record)?;
        Ok(record)
    }

    /// Flip a deployment to unhealthy. No-op while draining or already
    /// unhealthy.
    pub fn mark_unhealthy(&self, id: &str, reason: &str) -> DeployResult<DeploymentRecord> {
        self.set_health(id, DeploymentStatus::Unhealthy, Some(reason))
    }

    /// Flip an unhealthy deployment back to healthy. No-op otherwise.
    pub fn mark_healthy(&self, id: &str) -> DeployResult<DeploymentRecord> {
        self.set_health(id, DeploymentStatus::Healthy, None)
    }

    fn set_health(
        &self,
        id: &str,
        status: DeploymentStatus,
        reason: Option<&str>,
    ) -> DeployResult<DeploymentRecord> {
        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        // Draining always wins; health flips only between healthy/unhealthy.
        if record.status == DeploymentStatus::Draining || record.status == status {
            return Ok(record);
        }
        record.status = status;
        record.updated_at = epoch_millis();
        self.store.put_deployment(&record)?;
        match reason {
            Some(reason) => warn!(deployment = %id, reason, "deployment marked unhealthy"),
            None => info!(deployment = %id, "deployment marked healthy"),
        }
        Ok(record)
    }

    /// Advance every active drain ramp to `now`.
    ///
    /// Deployments whose ramp has finished are removed; their ids are
    /// returned. Called from the daemon's tick loop.
    pub fn advance_drains(&self, now: u64) -> DeployResult<Vec<DeploymentId>> {
        let mut removed = Vec::new();
        for record in self.store.list_deployments()? {
            let Some(drain) = record.drain else { continue };

            let lock = self.locks.acquire(&record.id);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

            // Re-read: the record may have changed since the list scan.
            let Some(mut record) = self.store.get_deployment(&record.id)? else {
                continue;
            };
            if record.drain != Some(drain) {
                continue;
            }

            let traffic = ramped_traffic(&drain, now);
            if traffic <= 0.0 {
                self.store.delete_deployment(&record.id)?;
                info!(deployment = %record.id, "drain complete, deployment removed");
                removed.push(record.id);
            } else if traffic < record.traffic {
                record.traffic = traffic;
                record.updated_at = now;
                self.store.put_deployment(&record)?;
                debug!(deployment = %record.id, traffic, "drain ramp advanced");
            }
        }
        Ok(removed)
    }

    /// Sum of traffic currently held by deployments of a model in an
    /// environment. Draining deployments count at their ramped value
    /// until removed; paused ones hold zero.
    fn allocated_traffic(&self, model_name: &str, environment: Stage) -> DeployResult<f64> {
        Ok(self
            .store
            .list_deployments()?
            .iter()
            .filter(|d| d.model_name == model_name && d.environment == environment)
            .map(|d| d.traffic)
            .sum())
    }
}

/// Linear ramp: the traffic a draining deployment holds at `now`.
fn ramped_traffic(drain: &DrainState, now: u64) -> f64 {
    let elapsed = now.saturating_sub(drain.started_at);
    if elapsed >= drain.duration_ms || drain.duration_ms == 0 {
        return 0.0;
    }
    let remaining = 1.0 - elapsed as f64 / drain.duration_ms as f64;
    drain.initial_traffic * remaining
}
