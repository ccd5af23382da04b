//! Database module for Uptrail.
//!
//! Provides SQLite storage with embedded migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
