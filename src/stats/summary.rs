//! Windowed uptime and latency aggregation.

use super::{ensure_target, StatsError};
use crate::db::{HistoryStore, Order, Outcome, OutcomeQuery, Status, Target};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const MAX_WINDOW_DAYS: i64 = 365;
pub const SPARKLINE_MAX_POINTS: i64 = 1000;

/// One point on the latency chart. Down samples plot at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparkPoint {
    pub t: DateTime<Utc>,
    pub ms: i64,
}

/// Aggregated view of a target over a trailing window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub target: Target,
    pub window_days: i64,
    pub uptime_percent: Option<f64>,
    pub average_response_ms: Option<i64>,
    pub sparkline: Vec<SparkPoint>,
}

/// Summarize a target over the last `days` days (default 30).
pub fn summarize(
    store: &dyn HistoryStore,
    target_id: i64,
    days: Option<i64>,
) -> Result<Summary, StatsError> {
    summarize_at(store, target_id, days, Utc::now())
}

/// Summarize relative to a fixed `now`.
///
/// Both queries share the same window start.
pub fn summarize_at(
    store: &dyn HistoryStore,
    target_id: i64,
    days: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Summary, StatsError> {
    let target = ensure_target(store, target_id)?;
    let window_days = days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, MAX_WINDOW_DAYS);
    let since = now - ChronoDuration::days(window_days);

    let windowed = store.query_outcomes(&OutcomeQuery::new(target_id, Order::Ascending).since(since))?;
    let up_count = windowed.iter().filter(|o| o.status == Status::Up).count();
    let uptime_percent = uptime_percent(windowed.len(), up_count);

    let average_response_ms = average_ms(
        windowed
            .iter()
            .filter(|o| o.status == Status::Up)
            .filter_map(|o| o.response_time_ms),
    );

    let mut latest = store.query_outcomes(
        &OutcomeQuery::new(target_id, Order::Descending)
            .since(since)
            .limit(SPARKLINE_MAX_POINTS),
    )?;
    latest.reverse();

    tracing::debug!(
        "Summary for target {} over {}d: {} samples, {} up",
        target_id,
        window_days,
        windowed.len(),
        up_count
    );

    Ok(Summary {
        target,
        window_days,
        uptime_percent,
        average_response_ms,
        sparkline: sparkline(&latest),
    })
}

/// Share of up samples as a percentage with one decimal place.
///
/// Undefined without samples.
pub fn uptime_percent(total: usize, up: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((up as f64 / total as f64 * 1000.0).round() / 10.0)
}

/// Mean latency rounded to the nearest millisecond.
pub fn average_ms<I>(latencies: I) -> Option<i64>
where
    I: IntoIterator<Item = i64>,
{
    let (sum, count) = latencies
        .into_iter()
        .fold((0i128, 0i128), |(sum, count), ms| (sum + ms as i128, count + 1));
    if count == 0 {
        return None;
    }
    Some((sum as f64 / count as f64).round() as i64)
}

/// Map ascending outcomes to chart points.
pub fn sparkline(outcomes: &[Outcome]) -> Vec<SparkPoint> {
    outcomes
        .iter()
        .map(|o| SparkPoint {
            t: o.time,
            ms: match (o.status, o.response_time_ms) {
                (Status::Up, Some(ms)) => ms,
                _ => 0,
            },
        })
        .collect()
}
