//! Append-only command history.

use std::collections::VecDeque;

use jiff::Timestamp;
use rusqlite::{Row, params};

use super::{
    Database,
    utils::{id_at, json_at, optional_id_at, optional_u64_at, parsed_at, timestamp_at},
};
use crate::{
    error::{DatabaseResultExt, Result},
    models::{CommandRecord, NewCommandRecord, RecordFilter},
};

const INSERT_RECORD_SQL: &str = "INSERT INTO command_records (intent, plan_id, step_id, step_kind, payload, directory, project, tags, outcome, exit_code, output, duration_ms, recorded_at, recorded_at_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";
const RECORD_COLUMNS: &str = "id, intent, plan_id, step_id, step_kind, payload, directory, project, tags, outcome, exit_code, output, duration_ms, recorded_at";

/// Rows fetched per page by [`HistoryCursor`].
pub const HISTORY_PAGE_SIZE: usize = 100;

impl Database {
    /// Appends a record and returns it with its assigned ID and timestamp.
    pub fn append_record(&mut self, record: &NewCommandRecord) -> Result<CommandRecord> {
        let now = Timestamp::now();
        let tags = serde_json::to_string(&record.tags)?;
        self.connection
            .execute(
                INSERT_RECORD_SQL,
                params![
                    record.intent,
                    record.plan_id.map(|id| id as i64),
                    record.step_id.map(|id| id as i64),
                    record.step_kind.as_str(),
                    record.payload,
                    record.directory,
                    record.project,
                    tags,
                    record.outcome.as_str(),
                    record.exit_code,
                    record.output,
                    record.duration_ms.map(|ms| ms as i64),
                    now.to_string(),
                    now.as_millisecond()
                ],
            )
            .db_context("Failed to insert command record")?;

        Ok(CommandRecord {
            id: self.connection.last_insert_rowid() as u64,
            intent: record.intent.clone(),
            plan_id: record.plan_id,
            step_id: record.step_id,
            step_kind: record.step_kind,
            payload: record.payload.clone(),
            directory: record.directory.clone(),
            project: record.project.clone(),
            tags: record.tags.clone(),
            outcome: record.outcome,
            exit_code: record.exit_code,
            output: record.output.clone(),
            duration_ms: record.duration_ms,
            recorded_at: now,
        })
    }

    /// Lazy most-recent-first iterator over records matching `filter`.
    ///
    /// `filter.text` is ignored here; similarity ranking happens in
    /// [`crate::memory`].
    pub fn history(&self, filter: &RecordFilter) -> HistoryCursor<'_> {
        HistoryCursor::new(self, filter.clone())
    }

    fn record_page(
        &self,
        filter: &RecordFilter,
        before_id: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<CommandRecord>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(before) = before_id {
            conditions.push("id < ?");
            params_vec.push(Box::new(before as i64));
        }
        if let Some(since) = filter.since {
            conditions.push("recorded_at_ms >= ?");
            params_vec.push(Box::new(since.as_millisecond()));
        }
        if let Some(until) = filter.until {
            conditions.push("recorded_at_ms <= ?");
            params_vec.push(Box::new(until.as_millisecond()));
        }
        if let Some(ref project) = filter.project {
            conditions.push("project = ?");
            params_vec.push(Box::new(project.clone()));
        }

        let mut query = format!("SELECT {RECORD_COLUMNS} FROM command_records");
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY id DESC LIMIT ?");
        params_vec.push(Box::new(page_size as i64));

        let mut stmt = self
            .connection
            .prepare(&query)
            .db_context("Failed to prepare query")?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| &**b).collect();

        stmt.query_map(&params_refs[..], Self::record_from_row)
            .db_context("Failed to query command records")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch command records")
    }

    fn record_from_row(row: &Row) -> rusqlite::Result<CommandRecord> {
        Ok(CommandRecord {
            id: id_at(row, 0)?,
            intent: row.get(1)?,
            plan_id: optional_id_at(row, 2)?,
            step_id: optional_id_at(row, 3)?,
            step_kind: parsed_at(row, 4)?,
            payload: row.get(5)?,
            directory: row.get(6)?,
            project: row.get(7)?,
            tags: json_at(row, 8)?,
            outcome: parsed_at(row, 9)?,
            exit_code: row.get(10)?,
            output: row.get(11)?,
            duration_ms: optional_u64_at(row, 12)?,
            recorded_at: timestamp_at(row, 13)?,
        })
    }
}

/// Keyset-paged history iterator.
///
/// Pages are fetched on demand with `id < last_seen`, so records appended
/// while iterating never show up twice and the iterator always ends.
/// [`HistoryCursor::restart`] begins again from the newest record.
pub struct HistoryCursor<'db> {
    db: &'db Database,
    filter: RecordFilter,
    page_size: usize,
    buffer: VecDeque<CommandRecord>,
    last_id: Option<u64>,
    yielded: usize,
    exhausted: bool,
}

impl<'db> HistoryCursor<'db> {
    fn new(db: &'db Database, filter: RecordFilter) -> Self {
        Self {
            db,
            filter,
            page_size: HISTORY_PAGE_SIZE,
            buffer: VecDeque::new(),
            last_id: None,
            yielded: 0,
            exhausted: false,
        }
    }

    /// Overrides the page size (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Rewinds to the newest record.
    pub fn restart(&mut self) {
        self.buffer.clear();
        self.last_id = None;
        self.yielded = 0;
        self.exhausted = false;
    }

    fn remaining(&self) -> usize {
        self.filter
            .limit
            .map_or(usize::MAX, |limit| limit.saturating_sub(self.yielded))
    }

    fn fill(&mut self) -> Result<()> {
        let page_size = self.page_size.min(self.remaining());
        let page = self.db.record_page(&self.filter, self.last_id, page_size)?;
        if page.len() < page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.last_id = Some(last.id);
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for HistoryCursor<'_> {
    type Item = Result<CommandRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining() == 0 {
            return None;
        }
        if self.buffer.is_empty() && !self.exhausted
            && let Err(e) = self.fill()
        {
            self.exhausted = true;
            return Some(Err(e));
        }
        let record = self.buffer.pop_front()?;
        self.yielded += 1;
        Some(Ok(record))
    }
}
