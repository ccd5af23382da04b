//! Outcome history queries.

use super::{ensure_target, StatsError};
use crate::db::{HistoryRow, HistoryStore, Order, OutcomeQuery, RecentOutcome, Store};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const DEFAULT_RECENT_LIMIT: i64 = 10;
pub const MAX_HISTORY_LIMIT: i64 = 200;

/// Clamp a caller-supplied row limit into `[1, 200]`.
pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_HISTORY_LIMIT)
}

/// Turn a status filter from the API into a store filter.
///
/// Missing, blank and `All` (any case) mean no filtering.
pub fn status_filter(status: Option<&str>) -> Option<String> {
    status
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
        .map(str::to_string)
}

/// Newest-first history of one target.
pub fn read_history(
    store: &dyn HistoryStore,
    target_id: i64,
    limit: Option<i64>,
    status: Option<&str>,
) -> Result<Vec<HistoryRow>, StatsError> {
    ensure_target(store, target_id)?;

    let mut query =
        OutcomeQuery::new(target_id, Order::Descending).limit(clamp_limit(limit, DEFAULT_HISTORY_LIMIT));
    if let Some(status) = status_filter(status) {
        query = query.status(status);
    }

    let rows = store.query_outcomes(&query)?;
    Ok(rows.into_iter().map(HistoryRow::from).collect())
}

/// Newest-first outcomes across every target.
pub fn read_recent(store: &Store, limit: Option<i64>) -> Result<Vec<RecentOutcome>, StatsError> {
    Ok(store.recent_outcomes(clamp_limit(limit, DEFAULT_RECENT_LIMIT))?)
}
