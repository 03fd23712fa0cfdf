//! Wrappers for displaying operation outcomes.

use std::fmt;

use crate::{
    backup::PruneReport,
    executor::{ExecutionOutcome, ExecutionReport},
    models::{Plan, StepStatus},
    orchestrator::{RequestState, ScheduledRun},
};

/// What happened when a plan ran.
///
/// Summarizes step results and, for a failure, names the failing step, its
/// error output and any automatic rollback.
pub struct ExecutionSummary<'a> {
    pub plan: &'a Plan,
    pub report: &'a ExecutionReport,
}

impl<'a> ExecutionSummary<'a> {
    pub fn new(plan: &'a Plan, report: &'a ExecutionReport) -> Self {
        Self { plan, report }
    }
}

impl fmt::Display for ExecutionSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |status: StepStatus| {
            self.plan
                .steps
                .iter()
                .filter(|step| step.status == status)
                .count()
        };

        match &self.report.outcome {
            ExecutionOutcome::Completed => {
                writeln!(f, "Plan {} completed.", self.report.plan_id)?;
            }
            ExecutionOutcome::Suspended {
                step_index,
                preview,
            } => {
                writeln!(
                    f,
                    "Plan {} paused before step {}, which may destroy data:",
                    self.report.plan_id,
                    step_index + 1
                )?;
                writeln!(f)?;
                writeln!(f, "    {preview}")?;
            }
            ExecutionOutcome::Failed {
                step_index,
                payload,
                stderr,
                cause,
                rollback,
            } => {
                writeln!(
                    f,
                    "Plan {} failed at step {}: {cause}",
                    self.report.plan_id,
                    step_index + 1
                )?;
                writeln!(f)?;
                writeln!(f, "```sh")?;
                writeln!(f, "{}", payload.trim_end())?;
                writeln!(f, "```")?;
                if !stderr.trim().is_empty() {
                    writeln!(f)?;
                    writeln!(f, "```")?;
                    writeln!(f, "{}", stderr.trim_end())?;
                    writeln!(f, "```")?;
                }
                if let Some(rollback) = rollback {
                    writeln!(f)?;
                    write!(f, "{rollback}")?;
                }
            }
        }

        for step in &self.plan.steps {
            if step.stdout.trim().is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "### Output of step {}", step.position + 1)?;
            writeln!(f)?;
            writeln!(f, "```")?;
            writeln!(f, "{}", step.stdout.trim_end())?;
            writeln!(f, "```")?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "- {} succeeded, {} failed, {} skipped, {} pending",
            count(StepStatus::Succeeded),
            count(StepStatus::Failed),
            count(StepStatus::Skipped),
            count(StepStatus::Pending)
        )?;

        let backups: Vec<String> = self
            .plan
            .steps
            .iter()
            .filter_map(|step| step.backup_id)
            .map(|id| id.to_string())
            .collect();
        if !backups.is_empty() {
            writeln!(f, "- Backups: {}", backups.join(", "))?;
        }

        Ok(())
    }
}

pub struct PruneResult(pub PruneReport);

impl fmt::Display for PruneResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Pruned {} backup entr{} and {} unreferenced blob{}.",
            self.0.entries,
            if self.0.entries == 1 { "y" } else { "ies" },
            self.0.blobs,
            if self.0.blobs == 1 { "" } else { "s" }
        )
    }
}

/// One line per fired schedule.
pub struct ScheduleRuns<'a>(pub &'a [ScheduledRun]);

impl fmt::Display for ScheduleRuns<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No schedules due.");
        }
        for run in self.0 {
            match &run.result {
                Ok(agent_run) => {
                    let note = match agent_run.state {
                        RequestState::AwaitingConfirmation => " (waiting for confirmation)",
                        _ => "",
                    };
                    writeln!(
                        f,
                        "- Schedule {}: plan {} {}{note}",
                        run.schedule_id, agent_run.plan.id, agent_run.state
                    )?;
                }
                Err(e) => writeln!(f, "- Schedule {}: {e}", run.schedule_id)?,
            }
        }
        Ok(())
    }
}
