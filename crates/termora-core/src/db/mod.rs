//! Database operations and SQLite management.
//!
//! One SQLite file holds plans, steps, command history, backup bookkeeping
//! and schedules. The connection runs in WAL mode so history readers never
//! block the writer, and with a busy timeout so concurrent writers wait for
//! each other instead of failing.

use std::{path::Path, time::Duration};

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

pub mod backup_queries;
pub mod migrations;
pub mod plan_queries;
pub mod record_queries;
pub mod schedule_queries;
pub(crate) mod utils;

pub use backup_queries::RestoreTarget;
pub use record_queries::HistoryCursor;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection and operations handler.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Opens (or creates) the database and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .db_context("Failed to set busy timeout")?;
        connection
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .db_context("Failed to enable WAL journal")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }
}
