//! Durable recording of probe outcomes.

use crate::db::{DbError, HistoryStore};
use crate::probe::ProbeOutcome;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Appends outcomes to history and refreshes the target snapshot.
///
/// Both writes land in one store transaction, inside that target's own
/// critical section, so the snapshot always mirrors the last appended row.
/// Unrelated targets never share a lock.
pub struct Recorder {
    store: Arc<dyn HistoryStore>,
    locks: RwLock<HashMap<i64, Arc<Mutex<()>>>>,
}

impl Recorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Record one outcome for `target_id`, returning the check time used.
    pub async fn record(
        &self,
        target_id: i64,
        outcome: ProbeOutcome,
    ) -> Result<DateTime<Utc>, DbError> {
        let lock = self.lock_for(target_id).await;
        let _guard = lock.lock().await;

        let checked_at = Utc::now();
        let status = outcome.status();
        let response_time_ms = outcome.response_time_ms();

        self.store
            .record_outcome(target_id, status, response_time_ms, checked_at)?;

        Ok(checked_at)
    }

    /// Drop the lock entry of a deleted target.
    pub async fn forget(&self, target_id: i64) {
        self.locks.write().await.remove(&target_id);
    }

    async fn lock_for(&self, target_id: i64) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(&target_id) {
            return lock.clone();
        }

        self.locks
            .write()
            .await
            .entry(target_id)
            .or_default()
            .clone()
    }
}
