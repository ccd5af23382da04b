//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;

mod embedded {
    refinery::embed_migrations!("migrations");
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const INSERT_OUTCOME: &str =
    "INSERT INTO outcomes (target_id, status, response_time_ms, checked_at) VALUES (?1, ?2, ?3, ?4)";
const UPDATE_SNAPSHOT: &str =
    "UPDATE targets SET status = ?1, response_time_ms = ?2, last_checked_at = ?3 WHERE id = ?4";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
}

/// The persistence operations the check and stats layers depend on.
pub trait HistoryStore: Send + Sync {
    /// All registered targets, newest first.
    fn list_targets(&self) -> Result<Vec<Target>, DbError>;

    /// A single target, or `DbError::NotFound`.
    fn get_target(&self, id: i64) -> Result<Target, DbError>;

    /// Append one immutable outcome row.
    fn append_outcome(
        &self,
        target_id: i64,
        status: Status,
        response_time_ms: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// Overwrite the target's last known state.
    fn update_snapshot(
        &self,
        target_id: i64,
        status: Status,
        response_time_ms: Option<i64>,
        checked_at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// Append an outcome and overwrite the snapshot as one unit.
    ///
    /// Either both writes apply or neither does.
    fn record_outcome(
        &self,
        target_id: i64,
        status: Status,
        response_time_ms: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// Read outcome rows for one target.
    fn query_outcomes(&self, query: &OutcomeQuery) -> Result<Vec<Outcome>, DbError>;
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        Self::init(Connection::open(path)?)
    }

    /// Create a store backed by a private in-memory database.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Run migrations and wrap the connection.
    fn init(mut conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let report = embedded::migrations::runner()
            .run(&mut conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;
        for migration in report.applied_migrations() {
            tracing::info!("Applied migration {}", migration);
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run raw SQL against the underlying connection.
    #[cfg(test)]
    pub fn run_sql(&self, sql: &str) -> Result<(), DbError> {
        self.conn().execute_batch(sql)?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite half-written.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- Target registry ---

    /// Register a new target. It starts in the `UNKNOWN` state.
    pub fn add_target(&self, name: &str, url: &str) -> Result<Target, DbError> {
        let created_at = Utc::now();
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO targets (name, url, created_at, status) VALUES (?1, ?2, ?3, ?4)",
                params![name, url, format_db_time(created_at), Status::Unknown.as_str()],
            )?;
            conn.last_insert_rowid()
        };
        self.get_target(id)
    }

    /// Rename a target or change its URL. History is kept.
    pub fn update_target(&self, id: i64, name: &str, url: &str) -> Result<Target, DbError> {
        let changed = self.conn().execute(
            "UPDATE targets SET name = ?1, url = ?2 WHERE id = ?3",
            params![name, url, id],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        self.get_target(id)
    }

    /// Delete a target and, through the foreign key, its history.
    pub fn delete_target(&self, id: i64) -> Result<(), DbError> {
        let changed = self
            .conn()
            .execute("DELETE FROM targets WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    // --- Cross-target history ---

    /// Most recent outcomes across all targets, newest first.
    pub fn recent_outcomes(&self, limit: i64) -> Result<Vec<RecentOutcome>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT o.target_id, t.name, o.status, o.response_time_ms, o.checked_at
             FROM outcomes o
             JOIN targets t ON o.target_id = t.id
             ORDER BY o.checked_at DESC, o.id DESC
             LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(RecentOutcome {
                    target_id: row.get(0)?,
                    target_name: row.get(1)?,
                    status: status_column(row, 2)?,
                    response_time_ms: row.get(3)?,
                    time: time_column(row, 4)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(rows)
    }
}

impl HistoryStore for Store {
    fn list_targets(&self) -> Result<Vec<Target>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, url, created_at, status, response_time_ms, last_checked_at
             FROM targets ORDER BY created_at DESC, id DESC",
        )?;

        let targets = stmt
            .query_map([], target_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(targets)
    }

    fn get_target(&self, id: i64) -> Result<Target, DbError> {
        self.conn()
            .query_row(
                "SELECT id, name, url, created_at, status, response_time_ms, last_checked_at
                 FROM targets WHERE id = ?1",
                params![id],
                target_from_row,
            )
            .optional()?
            .ok_or(DbError::NotFound)
    }

    fn append_outcome(
        &self,
        target_id: i64,
        status: Status,
        response_time_ms: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn().execute(
            INSERT_OUTCOME,
            params![target_id, status.as_str(), response_time_ms, format_db_time(at)],
        )?;
        Ok(())
    }

    fn update_snapshot(
        &self,
        target_id: i64,
        status: Status,
        response_time_ms: Option<i64>,
        checked_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let changed = self.conn().execute(
            UPDATE_SNAPSHOT,
            params![status.as_str(), response_time_ms, format_db_time(checked_at), target_id],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    fn record_outcome(
        &self,
        target_id: i64,
        status: Status,
        response_time_ms: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let at = format_db_time(at);
        tx.execute(
            INSERT_OUTCOME,
            params![target_id, status.as_str(), response_time_ms, at],
        )?;
        let changed = tx.execute(
            UPDATE_SNAPSHOT,
            params![status.as_str(), response_time_ms, at, target_id],
        )?;
        if changed == 0 {
            // Dropping the transaction rolls back the append.
            return Err(DbError::NotFound);
        }

        tx.commit()?;
        Ok(())
    }

    fn query_outcomes(&self, query: &OutcomeQuery) -> Result<Vec<Outcome>, DbError> {
        let mut sql = String::from(
            "SELECT target_id, status, response_time_ms, checked_at FROM outcomes WHERE target_id = ?",
        );
        let mut args = vec![Value::Integer(query.target_id)];

        if let Some(since) = query.since {
            sql.push_str(" AND checked_at >= ?");
            args.push(Value::Text(format_db_time(since)));
        }
        if let Some(status) = &query.status {
            sql.push_str(" AND UPPER(status) = ?");
            args.push(Value::Text(status.trim().to_ascii_uppercase()));
        }
        sql.push_str(match query.order {
            Order::Ascending => " ORDER BY checked_at ASC, id ASC",
            Order::Descending => " ORDER BY checked_at DESC, id DESC",
        });
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            args.push(Value::Integer(limit));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let outcomes = stmt
            .query_map(params_from_iter(args), |row| {
                Ok(Outcome {
                    target_id: row.get(0)?,
                    status: status_column(row, 1)?,
                    response_time_ms: row.get(2)?,
                    time: time_column(row, 3)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(outcomes)
    }
}

fn target_from_row(row: &Row<'_>) -> SqlResult<Target> {
    let last_checked: Option<String> = row.get(6)?;
    Ok(Target {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        created_at: time_column(row, 3)?,
        status: status_column(row, 4)?,
        response_time_ms: row.get(5)?,
        last_checked_at: last_checked.as_deref().and_then(parse_db_time),
    })
}

fn status_column(row: &Row<'_>, idx: usize) -> SqlResult<Status> {
    let raw: String = row.get(idx)?;
    raw.parse::<Status>().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn time_column(row: &Row<'_>, idx: usize) -> SqlResult<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_time(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {}", raw).into(),
        )
    })
}

/// Format a timestamp so that lexical order matches chronological order.
fn format_db_time(dt: DateTime<Utc>) -> String {
    dt.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        TIME_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%SZ",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
