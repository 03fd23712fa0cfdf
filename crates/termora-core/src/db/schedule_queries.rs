//! Schedule entry persistence.

use jiff::Timestamp;
use rusqlite::{OptionalExtension, Row, params};

use super::utils::{id_at, json_at, optional_timestamp_at, timestamp_at};
use crate::{
    error::{DatabaseResultExt, Result, TermoraError},
    models::{NewScheduleEntry, ScheduleEntry},
};

const INSERT_SCHEDULE_SQL: &str =
    "INSERT INTO schedule_entries (description, rule, template, enabled, created_at) VALUES (?1, ?2, ?3, 1, ?4)";
const SCHEDULE_COLUMNS: &str = "id, description, rule, template, enabled, last_fired_at, created_at";
const SET_ENABLED_SQL: &str = "UPDATE schedule_entries SET enabled = ?1 WHERE id = ?2";
const MARK_FIRED_SQL: &str = "UPDATE schedule_entries SET last_fired_at = ?1 WHERE id = ?2";
const DELETE_SCHEDULE_SQL: &str = "DELETE FROM schedule_entries WHERE id = ?1";

impl super::Database {
    pub fn insert_schedule(&mut self, entry: &NewScheduleEntry) -> Result<ScheduleEntry> {
        let now = Timestamp::now();
        self.connection
            .execute(
                INSERT_SCHEDULE_SQL,
                params![
                    entry.description,
                    serde_json::to_string(&entry.rule)?,
                    serde_json::to_string(&entry.template)?,
                    now.to_string()
                ],
            )
            .db_context("Failed to insert schedule entry")?;

        Ok(ScheduleEntry {
            id: self.connection.last_insert_rowid() as u64,
            description: entry.description.clone(),
            rule: entry.rule.clone(),
            template: entry.template.clone(),
            enabled: true,
            last_fired_at: None,
            created_at: now,
        })
    }

    pub fn get_schedule(&self, id: u64) -> Result<Option<ScheduleEntry>> {
        self.connection
            .query_row(
                &format!("SELECT {SCHEDULE_COLUMNS} FROM schedule_entries WHERE id = ?1"),
                params![id as i64],
                Self::schedule_from_row,
            )
            .optional()
            .db_context("Failed to query schedule entry")
    }

    /// All entries in id order.
    pub fn list_schedules(&self) -> Result<Vec<ScheduleEntry>> {
        let mut stmt = self
            .connection
            .prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedule_entries ORDER BY id"
            ))
            .db_context("Failed to prepare query")?;
        stmt.query_map([], Self::schedule_from_row)
            .db_context("Failed to query schedule entries")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch schedule entries")
    }

    pub fn set_schedule_enabled(&mut self, id: u64, enabled: bool) -> Result<()> {
        self.update_schedule(SET_ENABLED_SQL, params![enabled, id as i64], id)
    }

    pub fn mark_schedule_fired(&mut self, id: u64, at: Timestamp) -> Result<()> {
        self.update_schedule(MARK_FIRED_SQL, params![at.to_string(), id as i64], id)
    }

    pub fn delete_schedule(&mut self, id: u64) -> Result<()> {
        self.update_schedule(DELETE_SCHEDULE_SQL, params![id as i64], id)
    }

    fn update_schedule(&mut self, sql: &str, params: impl rusqlite::Params, id: u64) -> Result<()> {
        let rows = self
            .connection
            .execute(sql, params)
            .db_context("Failed to update schedule entry")?;
        if rows == 0 {
            return Err(TermoraError::ScheduleNotFound { id });
        }
        Ok(())
    }

    fn schedule_from_row(row: &Row) -> rusqlite::Result<ScheduleEntry> {
        Ok(ScheduleEntry {
            id: id_at(row, 0)?,
            description: row.get(1)?,
            rule: json_at(row, 2)?,
            template: json_at(row, 3)?,
            enabled: row.get(4)?,
            last_fired_at: optional_timestamp_at(row, 5)?,
            created_at: timestamp_at(row, 6)?,
        })
    }
}
