//! Plan and step persistence.

use jiff::Timestamp;
use rusqlite::{OptionalExtension, Row, Transaction, params};

use super::utils::{id_at, optional_id_at, optional_u64_at, parsed_at, timestamp_at};
use crate::{
    error::{DatabaseResultExt, Result, TermoraError},
    models::{Plan, PlanStatus, Step},
};

const INSERT_PLAN_SQL: &str = "INSERT INTO plans (intent, explanation, status, failure_policy, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const INSERT_STEP_SQL: &str = "INSERT INTO steps (plan_id, position, kind, payload, interpreter, explanation, destructive, independent, confirmed, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";
const SELECT_PLAN_SQL: &str = "SELECT id, intent, explanation, status, failure_policy, created_at FROM plans WHERE id = ?1";
const SELECT_RECENT_PLANS_SQL: &str = "SELECT id, intent, explanation, status, failure_policy, created_at FROM plans ORDER BY id DESC LIMIT ?1";
const SELECT_STEPS_SQL: &str = "SELECT id, plan_id, position, kind, payload, interpreter, explanation, destructive, independent, confirmed, status, exit_code, stdout, stderr, duration_ms, backup_id FROM steps WHERE plan_id = ?1 ORDER BY position";
const UPDATE_PLAN_STATUS_SQL: &str = "UPDATE plans SET status = ?1, updated_at = ?2 WHERE id = ?3";
const UPDATE_STEP_SQL: &str = "UPDATE steps SET confirmed = ?1, status = ?2, exit_code = ?3, stdout = ?4, stderr = ?5, duration_ms = ?6, backup_id = ?7 WHERE id = ?8";

impl super::Database {
    /// Persists a validated plan with its steps and assigns their IDs.
    pub fn insert_plan(&mut self, plan: &mut Plan) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let now = Timestamp::now().to_string();
        tx.execute(
            INSERT_PLAN_SQL,
            params![
                plan.intent,
                plan.explanation,
                plan.status.as_str(),
                plan.failure_policy.as_str(),
                plan.created_at.to_string(),
                &now
            ],
        )
        .db_context("Failed to insert plan")?;
        plan.id = tx.last_insert_rowid() as u64;

        for step in &mut plan.steps {
            step.plan_id = plan.id;
            tx.execute(
                INSERT_STEP_SQL,
                params![
                    plan.id as i64,
                    step.position,
                    step.kind.as_str(),
                    step.payload,
                    step.interpreter,
                    step.explanation,
                    step.destructive,
                    step.independent,
                    step.confirmed,
                    step.status.as_str()
                ],
            )
            .db_context("Failed to insert step")?;
            step.id = tx.last_insert_rowid() as u64;
        }

        tx.commit().db_context("Failed to commit transaction")
    }

    /// Retrieves a plan and its steps.
    pub fn get_plan(&self, id: u64) -> Result<Option<Plan>> {
        let plan = self
            .connection
            .query_row(SELECT_PLAN_SQL, params![id as i64], Self::plan_from_row)
            .optional()
            .db_context("Failed to query plan")?;

        match plan {
            Some(mut plan) => {
                plan.steps = self.get_steps(plan.id)?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }

    /// Most recent plans, newest first, with their steps.
    pub fn list_recent_plans(&self, limit: usize) -> Result<Vec<Plan>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_RECENT_PLANS_SQL)
            .db_context("Failed to prepare query")?;
        let mut plans = stmt
            .query_map(params![limit as i64], Self::plan_from_row)
            .db_context("Failed to query plans")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch plans")?;

        for plan in &mut plans {
            plan.steps = self.get_steps(plan.id)?;
        }
        Ok(plans)
    }

    fn get_steps(&self, plan_id: u64) -> Result<Vec<Step>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_STEPS_SQL)
            .db_context("Failed to prepare query")?;
        stmt.query_map(params![plan_id as i64], Self::step_from_row)
            .db_context("Failed to query steps")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch steps")
    }

    /// Writes the plan status and the progress of every step in one
    /// transaction.
    pub fn save_progress(&mut self, plan: &Plan) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        Self::write_plan_status(&tx, plan.id, plan.status)?;
        for step in &plan.steps {
            Self::write_step(&tx, step)?;
        }

        tx.commit().db_context("Failed to commit transaction")
    }

    /// Writes the progress of a single step.
    pub fn save_step(&mut self, step: &Step) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;
        Self::write_step(&tx, step)?;
        tx.commit().db_context("Failed to commit transaction")
    }

    fn write_plan_status(tx: &Transaction, id: u64, status: PlanStatus) -> Result<()> {
        let rows = tx
            .execute(
                UPDATE_PLAN_STATUS_SQL,
                params![status.as_str(), Timestamp::now().to_string(), id as i64],
            )
            .db_context("Failed to update plan status")?;
        if rows == 0 {
            return Err(TermoraError::PlanNotFound { id });
        }
        Ok(())
    }

    fn write_step(tx: &Transaction, step: &Step) -> Result<()> {
        tx.execute(
            UPDATE_STEP_SQL,
            params![
                step.confirmed,
                step.status.as_str(),
                step.exit_code,
                step.stdout,
                step.stderr,
                step.duration_ms.map(|ms| ms as i64),
                step.backup_id.map(|id| id as i64),
                step.id as i64
            ],
        )
        .db_context("Failed to update step")?;
        Ok(())
    }

    fn plan_from_row(row: &Row) -> rusqlite::Result<Plan> {
        Ok(Plan {
            id: id_at(row, 0)?,
            intent: row.get(1)?,
            explanation: row.get(2)?,
            status: parsed_at(row, 3)?,
            failure_policy: parsed_at(row, 4)?,
            created_at: timestamp_at(row, 5)?,
            steps: Vec::new(),
        })
    }

    fn step_from_row(row: &Row) -> rusqlite::Result<Step> {
        Ok(Step {
            id: id_at(row, 0)?,
            plan_id: id_at(row, 1)?,
            position: row.get(2)?,
            kind: parsed_at(row, 3)?,
            payload: row.get(4)?,
            interpreter: row.get(5)?,
            explanation: row.get(6)?,
            destructive: row.get(7)?,
            independent: row.get(8)?,
            confirmed: row.get(9)?,
            status: parsed_at(row, 10)?,
            exit_code: row.get(11)?,
            stdout: row.get(12)?,
            stderr: row.get(13)?,
            duration_ms: optional_u64_at(row, 14)?,
            backup_id: optional_id_at(row, 15)?,
        })
    }
}
