//! Read-side queries over recorded outcomes.

mod history;
mod summary;

pub use history::*;
pub use summary::*;

use crate::db::{DbError, HistoryStore, Target};
use thiserror::Error;

/// Stats error types.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("target {0} not found")]
    NotFound(i64),
    #[error("storage error: {0}")]
    Store(#[from] DbError),
}

fn ensure_target(store: &dyn HistoryStore, target_id: i64) -> Result<Target, StatsError> {
    store.get_target(target_id).map_err(|e| match e {
        DbError::NotFound => StatsError::NotFound(target_id),
        other => StatsError::Store(other),
    })
}
