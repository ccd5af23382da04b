//! Probe module for reachability checks.
//!
//! A probe makes exactly one bounded HTTP GET and folds every failure mode
//! into a `DOWN` outcome.

mod http;

pub use http::*;

use crate::db::Status;
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("unhealthy status code: {0}")]
    Status(u16),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// The classified result of a single probe attempt.
///
/// Latency exists only for `Up`, so the outcome invariant holds by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Up { response_time_ms: i64 },
    Down,
}

impl ProbeOutcome {
    pub fn status(&self) -> Status {
        match self {
            ProbeOutcome::Up { .. } => Status::Up,
            ProbeOutcome::Down => Status::Down,
        }
    }

    pub fn response_time_ms(&self) -> Option<i64> {
        match self {
            ProbeOutcome::Up { response_time_ms } => Some(*response_time_ms),
            ProbeOutcome::Down => None,
        }
    }
}

impl From<Result<Duration, ProbeError>> for ProbeOutcome {
    fn from(result: Result<Duration, ProbeError>) -> Self {
        match result {
            Ok(elapsed) => ProbeOutcome::Up {
                response_time_ms: elapsed.as_millis().min(i64::MAX as u128) as i64,
            },
            Err(_) => ProbeOutcome::Down,
        }
    }
}

/// Whether an HTTP status code counts as reachable.
pub fn is_healthy_status(code: u16) -> bool {
    (200..400).contains(&code)
}

/// Prefix a scheme when the target was registered as a bare host.
pub fn normalize_url(address: &str) -> String {
    let trimmed = address.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}
