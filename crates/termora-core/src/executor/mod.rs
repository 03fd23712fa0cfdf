//! Step-by-step plan execution.
//!
//! The executor walks a confirmed plan in order. Destructive steps suspend
//! the plan until they are granted (unless auto-confirm is on), are backed
//! up right before they run, and get their post-step fingerprint recorded
//! afterwards. Every executed step is appended to the memory store; a
//! failed append fails the step.
//!
//! ```text
//!             ┌──────────── confirm_step ────────────┐
//!             ▼                                      │
//! pending ─▶ confirmed ─▶ executing ─▶ pending (suspended)
//!    │           │            ├──────▶ completed
//!    └───────────┴─ cancel    └──────▶ failed ─▶ rolled_back
//! ```

use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};

use crate::{
    backup::BackupManager,
    context::SessionContext,
    error::{Result, TermoraError},
    memory::MemoryStore,
    models::{
        BackupEntry, FailurePolicy, NewCommandRecord, Outcome, Plan, PlanStatus, RollbackOutcome,
        ScheduleSpec, Step, StepKind, StepStatus,
    },
    store::Store,
};

pub mod paths;
pub mod report;
pub mod runner;

pub use report::{ExecutionOutcome, ExecutionReport};
pub use runner::{CommandRunner, ProcessOutput};

/// Default bound on a single step.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs plans for one session context.
#[derive(Clone)]
pub struct Executor {
    store: Store,
    backups: BackupManager,
    memory: Arc<dyn MemoryStore>,
    context: SessionContext,
    runner: CommandRunner,
    backup_enabled: bool,
}

/// Why a step ended up failed.
struct StepFailure {
    cause: String,
}

impl Executor {
    pub fn new(store: Store, memory: Arc<dyn MemoryStore>, context: SessionContext) -> Self {
        let runner = CommandRunner::new(&context.directory, DEFAULT_COMMAND_TIMEOUT);
        let backups = BackupManager::new(store.clone());
        Self {
            store,
            backups,
            memory,
            context,
            runner,
            backup_enabled: true,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.runner = CommandRunner::new(&self.context.directory, timeout);
        self
    }

    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backup_enabled = enabled;
        self
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Executes (or resumes) `plan`.
    ///
    /// The plan must be `confirmed`; with `auto_confirm` a `pending` plan is
    /// confirmed here and destructive steps run without suspending.
    ///
    /// # Errors
    ///
    /// Returns `TermoraError::InvalidState` for a plan in any other status and
    /// `TermoraError::BackupFailed` when a destructive step could not be
    /// backed up; the plan is then `failed` and nothing after the earlier
    /// steps ran.
    pub async fn execute(&self, plan: &mut Plan, auto_confirm: bool) -> Result<ExecutionReport> {
        if plan.status == PlanStatus::Pending && auto_confirm {
            plan.transition(PlanStatus::Confirmed)?;
        }
        if plan.status != PlanStatus::Confirmed {
            return Err(TermoraError::invalid_state(format!(
                "plan {} is {} and cannot be executed",
                plan.id,
                plan.status.as_str()
            )));
        }

        plan.transition(PlanStatus::Executing)?;
        self.store.save_progress(plan).await?;
        info!("Executing plan {} ({} steps)", plan.id, plan.steps.len());

        // A resumed plan may already carry a failure
        let mut first_failure = plan
            .steps
            .iter()
            .position(|step| step.status == StepStatus::Failed);
        let mut failure_cause = None;
        let mut rollback = None;

        for index in 0..plan.steps.len() {
            if plan.steps[index].status != StepStatus::Pending {
                continue;
            }

            if let Some(failed) = first_failure {
                let halt_all = plan.failure_policy == FailurePolicy::HaltAndRollback;
                if halt_all || !plan.steps[index].independent {
                    debug!("Skipping step {index} after failure of step {failed}");
                    plan.steps[index].transition(StepStatus::Skipped)?;
                    continue;
                }
            }

            let step = &plan.steps[index];
            if step.destructive && !auto_confirm && !step.confirmed {
                let preview = step.summary();
                plan.transition(PlanStatus::Pending)?;
                self.store.save_progress(plan).await?;
                info!("Plan {} suspended at destructive step {index}", plan.id);
                return Ok(ExecutionReport {
                    plan_id: plan.id,
                    outcome: ExecutionOutcome::Suspended {
                        step_index: index,
                        preview,
                    },
                });
            }

            let backup = match self.backup_step(&plan.steps[index]).await {
                Ok(backup) => backup,
                Err(e) => {
                    warn!("Backup for step {index} of plan {} failed: {e}", plan.id);
                    self.abort(plan, index).await?;
                    return Err(e);
                }
            };
            plan.steps[index].backup_id = backup.as_ref().map(|entry| entry.id);

            let Some(failure) = self.run_step(plan, index, backup.as_ref()).await? else {
                continue;
            };
            warn!("Step {index} of plan {} failed: {}", plan.id, failure.cause);
            if first_failure.is_some() {
                continue;
            }
            first_failure = Some(index);
            let mut cause = failure.cause;
            if plan.failure_policy == FailurePolicy::HaltAndRollback
                && let Some(entry) = backup.as_ref()
            {
                match self.backups.rollback(entry).await {
                    Ok(outcome) => rollback = Some(outcome),
                    Err(e) => {
                        warn!("Automatic rollback of backup {} failed: {e}", entry.id);
                        cause = format!("{cause}; rollback failed: {e}");
                    }
                }
            }
            failure_cause = Some(cause);
        }

        self.finish(plan, first_failure, failure_cause, rollback).await
    }

    /// Grants the suspended destructive step at `index` and confirms the
    /// plan again so the next [`Executor::execute`] re-enters that step.
    pub async fn confirm_step(&self, plan: &mut Plan, index: usize) -> Result<()> {
        let step = plan.steps.get(index).ok_or_else(|| {
            TermoraError::invalid_input("step").with_reason(format!("no step at index {index}"))
        })?;
        if step.status != StepStatus::Pending {
            return Err(TermoraError::invalid_state(format!(
                "step {index} is {} and cannot be confirmed",
                step.status.as_str()
            )));
        }
        if plan.status == PlanStatus::Pending {
            plan.transition(PlanStatus::Confirmed)?;
        }
        plan.steps[index].confirmed = true;
        self.store.save_progress(plan).await
    }

    /// Cancels a plan that has not started (or is suspended): remaining
    /// steps are skipped and the plan becomes `cancelled`.
    pub async fn cancel(&self, plan: &mut Plan) -> Result<()> {
        plan.transition(PlanStatus::Cancelled)?;
        for step in &mut plan.steps {
            if step.status == StepStatus::Pending {
                step.transition(StepStatus::Skipped)?;
            }
        }
        info!("Plan {} cancelled", plan.id);
        self.store.save_progress(plan).await
    }

    async fn backup_step(&self, step: &Step) -> Result<Option<BackupEntry>> {
        if !step.destructive || !self.backup_enabled || step.kind == StepKind::ScheduleDefinition {
            return Ok(None);
        }
        let targets = paths::extract_target_paths(&step.payload, &self.context.directory);
        debug!("Backing up {} target(s) for step {}", targets.len(), step.position);
        self.backups.backup(targets, Some(step)).await.map(Some)
    }

    /// Runs one step to an end state and records it. Returns the failure, if
    /// any.
    async fn run_step(
        &self,
        plan: &mut Plan,
        index: usize,
        backup: Option<&BackupEntry>,
    ) -> Result<Option<StepFailure>> {
        plan.steps[index].transition(StepStatus::Running)?;
        self.store.save_progress(plan).await?;
        debug!("Step {index} running: {}", plan.steps[index].summary());

        let step = &plan.steps[index];
        let output = match step.kind {
            StepKind::ShellCommand => self.runner.run_shell(&step.payload).await,
            StepKind::Script => {
                let interpreter = step.interpreter.as_deref().unwrap_or("sh");
                self.runner.run_script(interpreter, &step.payload).await
            }
            StepKind::ScheduleDefinition => Ok(self.register_schedule(&step.payload).await),
        };
        let output = output.unwrap_or_else(|e| ProcessOutput {
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("failed to start: {e}"),
            duration_ms: 0,
            timed_out: false,
        });

        if let Some(entry) = backup
            && let Err(e) = self.backups.record_after(entry).await
        {
            warn!("Could not fingerprint targets of backup {}: {e}", entry.id);
        }

        let mut failure = (!output.success()).then(|| StepFailure {
            cause: if output.timed_out {
                output.stderr.clone()
            } else {
                format!("exit code {}", output.exit_code)
            },
        });

        let record = NewCommandRecord {
            intent: plan.intent.clone(),
            plan_id: Some(plan.id),
            step_id: Some(step.id),
            step_kind: step.kind,
            payload: step.payload.clone(),
            directory: self.context.directory.display().to_string(),
            project: self.context.project.clone(),
            tags: self.context.tags.clone(),
            outcome: if failure.is_none() {
                Outcome::Success
            } else {
                Outcome::Failure
            },
            exit_code: Some(output.exit_code),
            output: NewCommandRecord::excerpt(&output.stdout),
            duration_ms: Some(output.duration_ms),
        };
        if let Err(e) = self.memory.append(record).await {
            warn!("History append failed for step {index}: {e}");
            failure.get_or_insert_with(|| StepFailure {
                cause: e.to_string(),
            });
        }

        let step = &mut plan.steps[index];
        step.exit_code = Some(output.exit_code);
        step.stdout = output.stdout;
        step.stderr = output.stderr;
        step.duration_ms = Some(output.duration_ms);
        step.transition(if failure.is_some() {
            StepStatus::Failed
        } else {
            StepStatus::Succeeded
        })?;
        self.store.save_progress(plan).await?;

        Ok(failure)
    }

    async fn register_schedule(&self, payload: &str) -> ProcessOutput {
        let registered = match ScheduleSpec::parse(payload).and_then(ScheduleSpec::into_entry) {
            Ok(entry) => self.store.register_schedule(entry).await,
            Err(e) => Err(e),
        };
        match registered {
            Ok(entry) => ProcessOutput {
                exit_code: 0,
                stdout: format!("Registered schedule {} ({})", entry.id, entry.description),
                stderr: String::new(),
                duration_ms: 0,
                timed_out: false,
            },
            Err(e) => ProcessOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: e.to_string(),
                duration_ms: 0,
                timed_out: false,
            },
        }
    }

    /// Ends the plan after a backup failure at `index`.
    async fn abort(&self, plan: &mut Plan, index: usize) -> Result<()> {
        for step in &mut plan.steps[index..] {
            if step.status == StepStatus::Pending {
                step.transition(StepStatus::Skipped)?;
            }
        }
        plan.transition(PlanStatus::Failed)?;
        self.store.save_progress(plan).await
    }

    async fn finish(
        &self,
        plan: &mut Plan,
        first_failure: Option<usize>,
        failure_cause: Option<String>,
        rollback: Option<RollbackOutcome>,
    ) -> Result<ExecutionReport> {
        let outcome = match first_failure {
            None => {
                plan.transition(PlanStatus::Completed)?;
                info!("Plan {} completed", plan.id);
                ExecutionOutcome::Completed
            }
            Some(index) => {
                plan.transition(PlanStatus::Failed)?;
                if rollback.is_some() {
                    plan.transition(PlanStatus::RolledBack)?;
                    info!("Plan {} rolled back after failure", plan.id);
                }
                let step = &plan.steps[index];
                ExecutionOutcome::Failed {
                    step_index: index,
                    payload: step.payload.clone(),
                    stderr: step.stderr.clone(),
                    // A failure carried over from a suspended run has no cause yet
                    cause: failure_cause.unwrap_or_else(|| match step.exit_code {
                        Some(0) => "history write failed".to_string(),
                        Some(code) => format!("exit code {code}"),
                        None => "not run".to_string(),
                    }),
                    rollback,
                }
            }
        };
        self.store.save_progress(plan).await?;
        Ok(ExecutionReport {
            plan_id: plan.id,
            outcome,
        })
    }
}
