//! Configuration module for Uptrail.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the API server (default: 3001)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "uptrail.db")
    pub db_path: String,
    /// Timeout applied to every probe (default: 5s)
    pub probe_timeout: Duration,
    /// Upper bound on probes in flight during a run-all (default: 32)
    pub max_concurrent_probes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 3001,
            db_path: "uptrail.db".to_string(),
            probe_timeout: Duration::from_millis(5000),
            max_concurrent_probes: 32,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPTRAIL_HTTP_PORT`: HTTP port (default: 3001)
    /// - `UPTRAIL_DB_PATH`: Database file path (default: "uptrail.db")
    /// - `UPTRAIL_PROBE_TIMEOUT_MS`: Probe timeout in milliseconds (default: 5000)
    /// - `UPTRAIL_MAX_CONCURRENT_PROBES`: Probe pool width (default: 32)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port_str) = lookup("UPTRAIL_HTTP_PORT") {
            match port_str.parse() {
                Ok(port) => cfg.http_port = port,
                Err(_) => tracing::warn!("Ignoring invalid UPTRAIL_HTTP_PORT: {}", port_str),
            }
        }

        if let Some(db_path) = lookup("UPTRAIL_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(timeout_str) = lookup("UPTRAIL_PROBE_TIMEOUT_MS") {
            match timeout_str.parse::<u64>() {
                Ok(ms) if ms > 0 => cfg.probe_timeout = Duration::from_millis(ms),
                _ => tracing::warn!("Ignoring invalid UPTRAIL_PROBE_TIMEOUT_MS: {}", timeout_str),
            }
        }

        if let Some(width_str) = lookup("UPTRAIL_MAX_CONCURRENT_PROBES") {
            match width_str.parse::<usize>() {
                Ok(width) if width > 0 => cfg.max_concurrent_probes = width,
                _ => tracing::warn!(
                    "Ignoring invalid UPTRAIL_MAX_CONCURRENT_PROBES: {}",
                    width_str
                ),
            }
        }

        cfg
    }
}
