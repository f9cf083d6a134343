//! Alert feed operations.

use std::sync::PoisonError;

use modelgrid_core::epoch_millis;
use modelgrid_state::{AlertKind, AlertRecord, AlertSeverity, KeyLocks, StateStore};
use tracing::{info, warn};

use crate::error::{AlertError, AlertResult};

/// The alert feed service.
#[derive(Clone)]
pub struct AlertFeed {
    store: StateStore,
    locks: KeyLocks,
}

impl AlertFeed {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
        }
    }

    /// Append an alert to the feed. Always succeeds; the id and
    /// timestamp are assigned here.
    pub fn raise(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        message: &str,
        model: &str,
    ) -> AlertResult<AlertRecord> {
        let seq = self.store.next_seq("alert")?;
        let record = AlertRecord {
            id: format!("alert-{seq}"),
            kind,
            severity,
            message: message.to_string(),
            model: model.to_string(),
            raised_at: epoch_millis(),
            acknowledged_at: None,
            seq,
        };
        self.store.put_alert(&record)?;
        warn!(alert = %record.id, ?kind, ?severity, model, "{message}");
        Ok(record)
    }

    /// Acknowledge an alert, exactly once.
    ///
    /// A second acknowledgement is rejected rather than silently
    /// accepted, so the first acknowledger stays on record.
    pub fn acknowledge(&self, id: &str) -> AlertResult<AlertRecord> {
        let lock = self.locks.acquire(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(id)?;
        if record.acknowledged_at.is_some() {
            return Err(AlertError::AlreadyAcknowledged(id.to_string()));
        }
        record.acknowledged_at = Some(epoch_millis());
        self.store.put_alert(&record)?;
        info!(alert = %id, "alert acknowledged");
        Ok(record)
    }

    /// Get an alert by id.
    pub fn get(&self, id: &str) -> AlertResult<AlertRecord> {
        self.store
            .get_alert(id)?
            .ok_or_else(|| AlertError::NotFound(id.to_string()))
    }

    /// List alerts, newest first.
    pub fn list(&self, active_only: bool) -> AlertResult<Vec<AlertRecord>> {
        let mut records: Vec<AlertRecord> = self
            .store
            .list_alerts()?
            .into_iter()
            .filter(|a| !active_only || a.is_active())
            .collect();
        records.sort_by(|a, b| (b.raised_at, b.seq).cmp(&(a.raised_at, a.seq)));
        Ok(records)
    }

    /// Number of unacknowledged alerts.
    pub fn active_count(&self) -> AlertResult<usize> {
        Ok(self
            .store
            .list_alerts()?
            .iter()
            .filter(|a| a.is_active())
            .count())
    }

    /// Whether an unacknowledged alert of this kind already exists for
    /// the model. Detection rules use this to avoid re-raising.
    pub fn has_active(&self, kind: AlertKind, model: &str) -> AlertResult<bool> {
        Ok(self
            .store
            .list_alerts()?
            .iter()
            .any(|a| a.is_active() && a.kind == kind && a.model == model))
    }
}
