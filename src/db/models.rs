//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reachability status of a target or of a single outcome.
///
/// Outcomes are only ever `Up` or `Down`. `Unknown` is the snapshot state
/// of a target that has never been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Down,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "UP",
            Status::Down => "DOWN",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Status::Up),
            "DOWN" => Ok(Status::Down),
            "UNKNOWN" => Ok(Status::Unknown),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// A monitored endpoint together with its last known state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub status: Status,
    pub response_time_ms: Option<i64>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// A single stored probe attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub target_id: i64,
    pub status: Status,
    pub response_time_ms: Option<i64>,
    pub time: DateTime<Utc>,
}

/// An outcome as exposed by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub time: DateTime<Utc>,
    pub status: Status,
    pub response_time_ms: Option<i64>,
}

impl From<Outcome> for HistoryRow {
    fn from(o: Outcome) -> Self {
        Self {
            time: o.time,
            status: o.status,
            response_time_ms: o.response_time_ms,
        }
    }
}

/// An outcome joined with the name of the target it belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOutcome {
    pub target_id: i64,
    pub target_name: String,
    pub status: Status,
    pub response_time_ms: Option<i64>,
    pub time: DateTime<Utc>,
}

/// Sort direction for outcome queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// Parameters for reading a target's outcome history.
///
/// `status` is compared case-insensitively against the stored status.
#[derive(Debug, Clone)]
pub struct OutcomeQuery {
    pub target_id: i64,
    pub since: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub order: Order,
}

impl OutcomeQuery {
    pub fn new(target_id: i64, order: Order) -> Self {
        Self {
            target_id,
            since: None,
            status: None,
            limit: None,
            order,
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}
