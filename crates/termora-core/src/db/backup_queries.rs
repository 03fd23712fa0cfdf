//! Backup entry bookkeeping.
//!
//! Mutations run in `BEGIN IMMEDIATE` transactions. A restore holds its
//! transaction from reading the `restored` flag until the flag is set, so
//! concurrent restores of one entry serialize on the write lock.

use std::{collections::HashSet, time::Duration};

use jiff::Timestamp;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};

use super::utils::{id_at, json_at, optional_id_at, optional_timestamp_at, timestamp_at};
use crate::{
    error::{DatabaseResultExt, Result, TermoraError},
    models::{BackupEntry, BackupItem, Fingerprint, RollbackOutcome},
};

/// How long a restore waits for another restore to release the write lock.
const RESTORE_BUSY_TIMEOUT: Duration = Duration::from_secs(300);

const INSERT_BACKUP_SQL: &str = "INSERT INTO backup_entries (step_id, plan_id, items, created_at, created_at_ms) VALUES (?1, ?2, ?3, ?4, ?5)";
const BACKUP_COLUMNS: &str = "id, step_id, plan_id, items, created_at, restored, restored_at";
const UPDATE_ITEMS_SQL: &str = "UPDATE backup_entries SET items = ?1 WHERE id = ?2";
const MARK_RESTORED_SQL: &str =
    "UPDATE backup_entries SET restored = 1, restored_at = ?1 WHERE id = ?2 AND restored = 0";
const SELECT_LATEST_UNRESTORED_SQL: &str =
    "SELECT id FROM backup_entries WHERE restored = 0 ORDER BY id DESC LIMIT 1";
const DELETE_OLDER_SQL: &str = "DELETE FROM backup_entries WHERE created_at_ms < ?1";
const SELECT_ITEMS_SQL: &str = "SELECT items FROM backup_entries";

/// Which entry a restore applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreTarget {
    Id(u64),
    LatestUnrestored,
}

impl super::Database {
    /// Stores a new unrestored entry.
    pub fn insert_backup(
        &mut self,
        step_id: Option<u64>,
        plan_id: Option<u64>,
        items: Vec<BackupItem>,
    ) -> Result<BackupEntry> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let now = Timestamp::now();
        tx.execute(
            INSERT_BACKUP_SQL,
            params![
                step_id.map(|id| id as i64),
                plan_id.map(|id| id as i64),
                serde_json::to_string(&items)?,
                now.to_string(),
                now.as_millisecond()
            ],
        )
        .db_context("Failed to insert backup entry")?;
        let id = tx.last_insert_rowid() as u64;
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(BackupEntry {
            id,
            step_id,
            plan_id,
            items,
            created_at: now,
            restored: false,
            restored_at: None,
        })
    }

    pub fn get_backup(&self, id: u64) -> Result<Option<BackupEntry>> {
        self.connection
            .query_row(
                &format!("SELECT {BACKUP_COLUMNS} FROM backup_entries WHERE id = ?1"),
                params![id as i64],
                Self::backup_from_row,
            )
            .optional()
            .db_context("Failed to query backup entry")
    }

    /// All entries, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        let mut stmt = self
            .connection
            .prepare(&format!(
                "SELECT {BACKUP_COLUMNS} FROM backup_entries ORDER BY id DESC"
            ))
            .db_context("Failed to prepare query")?;
        stmt.query_map([], Self::backup_from_row)
            .db_context("Failed to query backup entries")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch backup entries")
    }

    /// Replaces the item list (used to record post-step fingerprints).
    pub fn update_backup_items(&mut self, id: u64, items: &[BackupItem]) -> Result<()> {
        let rows = self
            .connection
            .execute(UPDATE_ITEMS_SQL, params![serde_json::to_string(items)?, id as i64])
            .db_context("Failed to update backup entry")?;
        if rows == 0 {
            return Err(TermoraError::BackupNotFound { id });
        }
        Ok(())
    }

    /// Restores one entry under the write lock.
    ///
    /// `restore` sees the entry as stored once the lock is held and does the
    /// filesystem work; the entry is marked restored in the same
    /// transaction. An entry some other caller restored first yields
    /// `AlreadyRestored` without calling `restore`. If `restore` fails the
    /// transaction rolls back and the entry stays unrestored.
    pub fn restore_backup<F>(&mut self, target: RestoreTarget, restore: F) -> Result<RollbackOutcome>
    where
        F: FnOnce(&BackupEntry) -> Result<()>,
    {
        self.connection
            .busy_timeout(RESTORE_BUSY_TIMEOUT)
            .db_context("Failed to set busy timeout")?;
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let id = match target {
            RestoreTarget::Id(id) => id,
            RestoreTarget::LatestUnrestored => tx
                .query_row(SELECT_LATEST_UNRESTORED_SQL, [], |row| id_at(row, 0))
                .optional()
                .db_context("Failed to query backup entry")?
                .ok_or(TermoraError::NothingToRollback)?,
        };
        let entry = tx
            .query_row(
                &format!("SELECT {BACKUP_COLUMNS} FROM backup_entries WHERE id = ?1"),
                params![id as i64],
                Self::backup_from_row,
            )
            .optional()
            .db_context("Failed to query backup entry")?
            .ok_or(TermoraError::BackupNotFound { id })?;
        if entry.restored {
            return Ok(RollbackOutcome::AlreadyRestored { id });
        }

        restore(&entry)?;

        let now = Timestamp::now();
        tx.execute(MARK_RESTORED_SQL, params![now.to_string(), id as i64])
            .db_context("Failed to mark backup restored")?;
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(RollbackOutcome::Restored {
            entry: BackupEntry {
                restored: true,
                restored_at: Some(now),
                ..entry
            },
        })
    }

    /// Deletes entries created before `cutoff`; returns how many went.
    pub fn delete_backups_before(&mut self, cutoff: Timestamp) -> Result<usize> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;
        let removed = tx
            .execute(DELETE_OLDER_SQL, params![cutoff.as_millisecond()])
            .db_context("Failed to delete backup entries")?;
        tx.commit().db_context("Failed to commit transaction")?;
        Ok(removed)
    }

    /// Blob fingerprints referenced by any stored entry.
    pub fn referenced_blobs(&self) -> Result<HashSet<Fingerprint>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_ITEMS_SQL)
            .db_context("Failed to prepare query")?;
        let item_lists = stmt
            .query_map([], |row| json_at::<Vec<BackupItem>>(row, 0))
            .db_context("Failed to query backup items")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch backup items")?;
        Ok(item_lists
            .iter()
            .flatten()
            .flat_map(|item| item.before.blobs())
            .cloned()
            .collect())
    }

    fn backup_from_row(row: &Row) -> rusqlite::Result<BackupEntry> {
        Ok(BackupEntry {
            id: id_at(row, 0)?,
            step_id: optional_id_at(row, 1)?,
            plan_id: optional_id_at(row, 2)?,
            items: json_at(row, 3)?,
            created_at: timestamp_at(row, 4)?,
            restored: row.get(5)?,
            restored_at: optional_timestamp_at(row, 6)?,
        })
    }
}
