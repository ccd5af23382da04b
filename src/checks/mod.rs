//! Check orchestration: probe targets concurrently and record every outcome.

mod recorder;

pub use recorder::*;

use crate::db::{DbError, HistoryStore, Status, Target};
use crate::probe::{normalize_url, Prober};

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Check error types.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("target {0} not found")]
    NotFound(i64),
    #[error("failed to record outcome for target {target_id}: {source}")]
    Record {
        target_id: i64,
        #[source]
        source: DbError,
    },
    #[error("storage error: {0}")]
    Store(#[from] DbError),
}

/// Result of one probe-and-record cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRunResult {
    pub id: i64,
    pub name: String,
    pub status: Status,
    pub response_time_ms: Option<i64>,
}

/// A target whose outcome could not be durably recorded.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCheck {
    pub id: i64,
    pub name: String,
    pub error: String,
}

/// Outcome of a run over many targets.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub checked: usize,
    pub results: Vec<CheckRunResult>,
    pub failed: Vec<FailedCheck>,
}

impl RunReport {
    /// True when there was work to do and none of it was recorded.
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.results.is_empty()
    }
}

/// Runs probes across targets with a bounded number in flight.
pub struct Checker {
    store: Arc<dyn HistoryStore>,
    prober: Prober,
    recorder: Arc<Recorder>,
    permits: Arc<Semaphore>,
}

impl Checker {
    pub fn new(store: Arc<dyn HistoryStore>, prober: Prober, max_concurrent: usize) -> Self {
        let recorder = Arc::new(Recorder::new(store.clone()));
        Self {
            store,
            prober,
            recorder,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Probe and record a single target by id.
    pub async fn run_one(&self, target_id: i64) -> Result<CheckRunResult, CheckError> {
        let target = self.store.get_target(target_id).map_err(|e| match e {
            DbError::NotFound => CheckError::NotFound(target_id),
            other => CheckError::Store(other),
        })?;

        check_target(
            self.prober.clone(),
            self.recorder.clone(),
            self.permits.clone(),
            target,
        )
        .await
    }

    /// Probe and record every registered target.
    pub async fn run_all(&self) -> Result<RunReport, CheckError> {
        let targets = self.store.list_targets()?;
        Ok(self.run_targets(targets).await)
    }

    /// Probe and record the given targets concurrently.
    ///
    /// Results come back in input order. Targets whose outcome could not be
    /// recorded are listed in `failed` and do not hold back the others.
    pub async fn run_targets(&self, targets: Vec<Target>) -> RunReport {
        if targets.is_empty() {
            return RunReport {
                checked: 0,
                results: Vec::new(),
                failed: Vec::new(),
            };
        }

        tracing::info!("Running checks for {} targets", targets.len());

        let mut tasks = JoinSet::new();
        let mut identities = Vec::with_capacity(targets.len());

        for (idx, target) in targets.into_iter().enumerate() {
            identities.push((target.id, target.name.clone()));

            let prober = self.prober.clone();
            let recorder = self.recorder.clone();
            let permits = self.permits.clone();
            tasks.spawn(async move { (idx, check_target(prober, recorder, permits, target).await) });
        }

        let mut slots: Vec<Option<Result<CheckRunResult, String>>> =
            (0..identities.len()).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result.map_err(|e| e.to_string())),
                Err(e) => tracing::error!("Check task failed: {}", e),
            }
        }

        let mut results = Vec::new();
        let mut failed = Vec::new();
        for ((id, name), slot) in identities.into_iter().zip(slots) {
            match slot {
                Some(Ok(result)) => results.push(result),
                Some(Err(error)) => failed.push(FailedCheck { id, name, error }),
                None => failed.push(FailedCheck {
                    id,
                    name,
                    error: "check task aborted".to_string(),
                }),
            }
        }

        tracing::info!(
            "Checks finished: {} recorded, {} failed",
            results.len(),
            failed.len()
        );

        RunReport {
            checked: results.len() + failed.len(),
            results,
            failed,
        }
    }

    /// Release per-target state after a target is deleted.
    pub async fn forget(&self, target_id: i64) {
        self.recorder.forget(target_id).await;
    }
}

async fn check_target(
    prober: Prober,
    recorder: Arc<Recorder>,
    permits: Arc<Semaphore>,
    target: Target,
) -> Result<CheckRunResult, CheckError> {
    // The semaphore is never closed.
    let _permit = permits.acquire_owned().await.ok();

    let outcome = prober.probe(&normalize_url(&target.url)).await;

    recorder.record(target.id, outcome).await.map_err(|source| {
        tracing::error!("Failed to record outcome for {}: {}", target.name, source);
        CheckError::Record {
            target_id: target.id,
            source,
        }
    })?;

    Ok(CheckRunResult {
        id: target.id,
        name: target.name,
        status: outcome.status(),
        response_time_ms: outcome.response_time_ms(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Order, OutcomeQuery, Outcome, Store};
    use crate::test_support::{spawn_fixture_server, unreachable_url};
    use chrono::{DateTime, Utc};
    use std::time::{Duration, Instant};
    use tokio_test::{assert_err, assert_ok};

    fn checker(store: Arc<dyn HistoryStore>, timeout: Duration) -> Checker {
        Checker::new(store, Prober::new(timeout).unwrap(), 8)
    }

    /// Delegates to a real store but refuses to write outcomes for one target.
    struct FailingStore {
        inner: Store,
        broken_target: i64,
    }

    impl HistoryStore for FailingStore {
        fn list_targets(&self) -> Result<Vec<Target>, DbError> {
            self.inner.list_targets()
        }

        fn get_target(&self, id: i64) -> Result<Target, DbError> {
            self.inner.get_target(id)
        }

        fn append_outcome(
            &self,
            target_id: i64,
            status: Status,
            response_time_ms: Option<i64>,
            at: DateTime<Utc>,
        ) -> Result<(), DbError> {
            if target_id == self.broken_target {
                return Err(DbError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.append_outcome(target_id, status, response_time_ms, at)
        }

        fn update_snapshot(
            &self,
            target_id: i64,
            status: Status,
            response_time_ms: Option<i64>,
            checked_at: DateTime<Utc>,
        ) -> Result<(), DbError> {
            self.inner
                .update_snapshot(target_id, status, response_time_ms, checked_at)
        }

        fn record_outcome(
            &self,
            target_id: i64,
            status: Status,
            response_time_ms: Option<i64>,
            at: DateTime<Utc>,
        ) -> Result<(), DbError> {
            if target_id == self.broken_target {
                return Err(DbError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.record_outcome(target_id, status, response_time_ms, at)
        }

        fn query_outcomes(&self, query: &OutcomeQuery) -> Result<Vec<Outcome>, DbError> {
            self.inner.query_outcomes(query)
        }
    }

    #[tokio::test]
    async fn test_run_one_up() {
        let base = spawn_fixture_server().await;
        let store = Arc::new(Store::open_in_memory().unwrap());
        let target = store.add_target("Fixture", &format!("{}/ok", base)).unwrap();
        let checker = checker(store.clone(), Duration::from_secs(2));

        let result = assert_ok!(checker.run_one(target.id).await);
        assert_eq!(result.id, target.id);
        assert_eq!(result.name, "Fixture");
        assert_eq!(result.status, Status::Up);
        assert!(result.response_time_ms.is_some());

        let snapshot = store.get_target(target.id).unwrap();
        assert_eq!(snapshot.status, Status::Up);
        assert_eq!(snapshot.response_time_ms, result.response_time_ms);
    }

    #[tokio::test]
    async fn test_run_one_unreachable_is_down() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let target = store.add_target("Gone", &unreachable_url().await).unwrap();
        let checker = checker(store.clone(), Duration::from_millis(500));

        let result = assert_ok!(checker.run_one(target.id).await);
        assert_eq!(result.status, Status::Down);
        assert_eq!(result.response_time_ms, None);

        let rows = store
            .query_outcomes(&OutcomeQuery::new(target.id, Order::Descending).limit(1))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, Status::Down);
        assert_eq!(rows[0].response_time_ms, None);
    }

    #[tokio::test]
    async fn test_run_one_unknown_target() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let checker = checker(store, Duration::from_millis(100));

        let err = assert_err!(checker.run_one(77).await);
        assert!(matches!(err, CheckError::NotFound(77)));
    }

    #[tokio::test]
    async fn test_run_all_empty() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let checker = checker(store, Duration::from_millis(100));

        let report = assert_ok!(checker.run_all().await);
        assert_eq!(report.checked, 0);
        assert!(report.results.is_empty());
        assert!(report.failed.is_empty());
        assert!(!report.all_failed());
    }

    #[tokio::test]
    async fn test_run_all_slow_target_bounded_by_timeout() {
        let base = spawn_fixture_server().await;
        let store = Arc::new(Store::open_in_memory().unwrap());
        let fast = store.add_target("Fast", &format!("{}/ok", base)).unwrap();
        let slow = store.add_target("Slow", &format!("{}/slow", base)).unwrap();
        let broken = store.add_target("Broken", &format!("{}/error", base)).unwrap();

        let timeout = Duration::from_millis(600);
        let checker = checker(store.clone(), timeout);

        let start = Instant::now();
        let report = assert_ok!(checker.run_all().await);
        let elapsed = start.elapsed();

        assert_eq!(report.checked, 3);
        assert_eq!(report.results.len(), 3);
        assert!(report.failed.is_empty());
        assert!(elapsed < timeout * 2, "run took {:?}", elapsed);

        let status_of = |id: i64| {
            report
                .results
                .iter()
                .find(|r| r.id == id)
                .map(|r| r.status)
                .unwrap()
        };
        assert_eq!(status_of(fast.id), Status::Up);
        assert_eq!(status_of(slow.id), Status::Down);
        assert_eq!(status_of(broken.id), Status::Down);

        for result in &report.results {
            assert_eq!(result.response_time_ms.is_some(), result.status == Status::Up);
        }
    }

    #[tokio::test]
    async fn test_run_targets_keeps_input_order() {
        let base = spawn_fixture_server().await;
        let store = Arc::new(Store::open_in_memory().unwrap());
        let a = store.add_target("A", &format!("{}/slow", base)).unwrap();
        let b = store.add_target("B", &format!("{}/ok", base)).unwrap();
        let checker = checker(store, Duration::from_millis(300));

        let report = checker.run_targets(vec![a.clone(), b.clone()]).await;
        let ids: Vec<i64> = report.results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_run_all_reports_recording_failure_per_target() {
        let base = spawn_fixture_server().await;
        let inner = Store::open_in_memory().unwrap();
        let good = inner.add_target("Good", &format!("{}/ok", base)).unwrap();
        let bad = inner.add_target("Bad", &format!("{}/ok", base)).unwrap();
        let store = Arc::new(FailingStore {
            inner: inner.clone(),
            broken_target: bad.id,
        });
        let checker = checker(store, Duration::from_secs(2));

        let report = assert_ok!(checker.run_all().await);
        assert_eq!(report.checked, 2);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].id, good.id);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, bad.id);
        assert!(!report.all_failed());

        // The failed target's snapshot was never touched.
        assert_eq!(inner.get_target(bad.id).unwrap().status, Status::Unknown);

        let err = assert_err!(checker.run_one(bad.id).await);
        assert!(matches!(err, CheckError::Record { target_id, .. } if target_id == bad.id));
    }

    #[tokio::test]
    async fn test_narrow_pool_still_completes() {
        let base = spawn_fixture_server().await;
        let store = Arc::new(Store::open_in_memory().unwrap());
        for i in 0..5 {
            store
                .add_target(&format!("T{}", i), &format!("{}/ok", base))
                .unwrap();
        }
        let checker = Checker::new(store, Prober::new(Duration::from_secs(2)).unwrap(), 1);

        let report = assert_ok!(checker.run_all().await);
        assert_eq!(report.results.len(), 5);
        assert!(report.results.iter().all(|r| r.status == Status::Up));
    }
}
