//! Persistent state of the agent.
//!
//! [`Store`] is the async face of the database: it owns the data directory
//! layout and runs every [`Database`] call on the blocking thread pool with
//! a short-lived connection, so no connection or lock is held across an
//! `.await` on planning or confirmation.
//!
//! ```text
//! <data_dir>/
//! ├── termora.db        plans, steps, history, backups, schedules
//! ├── backups/blobs/    content-addressed snapshot arena
//! └── logs/             default log directory
//! ```

use std::path::{Path, PathBuf};

use tokio::task;

use crate::{
    db::Database,
    error::{Result, TermoraError},
};

pub mod builder;
pub mod plan_ops;
pub mod schedule_ops;

pub use builder::StoreBuilder;

pub(crate) const DATABASE_FILE: &str = "termora.db";

/// Handle on the data directory.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub(crate) fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("backups").join("blobs")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Runs `op` against a fresh connection on the blocking pool.
    pub(crate) async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path();
        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            op(&mut db)
        })
        .await
        .map_err(TermoraError::join)?
    }
}
