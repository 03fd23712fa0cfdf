//! Display implementations for domain models.
//!
//! Everything renders as markdown for the CLI's terminal renderer. A plan
//! renders as the preview shown before confirmation: one section per step
//! with its payload, explanation and whether it is destructive.

use std::fmt;

use super::datetime::{Elapsed, LocalDateTime};
use crate::models::{
    BackupEntry, CommandRecord, FailurePolicy, Outcome, Plan, PlanStatus, RollbackOutcome,
    ScheduleEntry, ScheduleTemplate, Step, StepKind, StepStatus,
};

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Plan {}: {}", self.id, self.intent)?;
        writeln!(f)?;

        if let Some(explanation) = &self.explanation {
            writeln!(f, "{explanation}")?;
            writeln!(f)?;
        }

        writeln!(f, "- Status: {}", self.status)?;
        if self.failure_policy != FailurePolicy::Halt {
            writeln!(f, "- On failure: {}", self.failure_policy)?;
        }
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;

        if self.steps.is_empty() {
            writeln!(f, "\nNo steps in this plan.")?;
            return Ok(());
        }

        writeln!(f, "\n## Steps")?;
        writeln!(f)?;
        for step in &self.steps {
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl Step {
    fn fmt_step(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.destructive {
            flags.push("⚠ destructive");
        }
        if self.independent {
            flags.push("independent");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };

        writeln!(
            f,
            "### {}. {} ({}){flags}",
            self.position + 1,
            self.kind,
            self.status.with_icon()
        )?;
        writeln!(f)?;

        let language = match self.kind {
            StepKind::Script => self.interpreter.as_deref().unwrap_or("sh"),
            StepKind::ShellCommand => "sh",
            StepKind::ScheduleDefinition => "text",
        };
        writeln!(f, "```{language}")?;
        writeln!(f, "{}", self.payload.trim_end())?;
        writeln!(f, "```")?;
        writeln!(f)?;

        if let Some(explanation) = &self.explanation {
            writeln!(f, "{explanation}")?;
            writeln!(f)?;
        }

        if let Some(code) = self.exit_code {
            let duration = self
                .duration_ms
                .map(|ms| format!(" in {}", Elapsed(ms)))
                .unwrap_or_default();
            writeln!(f, "- Exit code: {code}{duration}")?;
        }
        if let Some(backup) = self.backup_id {
            writeln!(f, "- Backup: {backup}")?;
        }
        if self.status == StepStatus::Failed && !self.stderr.trim().is_empty() {
            writeln!(f)?;
            writeln!(f, "#### Error output")?;
            writeln!(f)?;
            writeln!(f, "```")?;
            writeln!(f, "{}", self.stderr.trim_end())?;
            writeln!(f, "```")?;
        }
        if self.exit_code.is_some() || self.backup_id.is_some() {
            writeln!(f)?;
        }

        Ok(())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_step(f)
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self.outcome {
            Outcome::Success => "✓",
            Outcome::Failure => "✗",
        };
        let first_line = self.payload.lines().next().unwrap_or_default();
        writeln!(f, "## {icon} `{first_line}` (ID: {})", self.id)?;
        writeln!(f)?;
        writeln!(f, "- **Intent**: {}", self.intent)?;
        writeln!(f, "- **Directory**: {}", self.directory)?;
        if let Some(project) = &self.project {
            writeln!(f, "- **Project**: {project}")?;
        }
        if let Some(code) = self.exit_code {
            writeln!(f, "- **Exit code**: {code}")?;
        }
        writeln!(f, "- **Recorded**: {}", LocalDateTime(&self.recorded_at))?;
        writeln!(f)?;
        Ok(())
    }
}

impl fmt::Display for BackupEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.restored { "restored" } else { "available" };
        writeln!(f, "## Backup {} ({state})", self.id)?;
        writeln!(f)?;
        if let Some(plan_id) = self.plan_id {
            writeln!(f, "- **Plan**: {plan_id}")?;
        }
        writeln!(f, "- **Created**: {}", LocalDateTime(&self.created_at))?;
        if let Some(restored_at) = &self.restored_at {
            writeln!(f, "- **Restored**: {}", LocalDateTime(restored_at))?;
        }
        for item in &self.items {
            let files = item.before.file_count();
            let noun = if files == 1 { "file" } else { "files" };
            writeln!(f, "- `{}` ({files} {noun})", item.path.display())?;
        }
        writeln!(f)?;
        Ok(())
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.enabled { "enabled" } else { "disabled" };
        writeln!(f, "## Schedule {}: {} ({state})", self.id, self.description)?;
        writeln!(f)?;
        writeln!(f, "- **Rule**: {}", self.rule)?;
        match &self.template {
            ScheduleTemplate::Intent(intent) => writeln!(f, "- **Intent**: {intent}")?,
            ScheduleTemplate::Plan(steps) => {
                writeln!(f, "- **Steps**: {}", steps.len())?;
                for step in steps {
                    writeln!(f, "  - `{}`", step.summary())?;
                }
            }
        }
        match &self.last_fired_at {
            Some(at) => writeln!(f, "- **Last fired**: {}", LocalDateTime(at))?,
            None => writeln!(f, "- **Last fired**: never")?,
        }
        writeln!(f)?;
        Ok(())
    }
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackOutcome::Restored { entry } => {
                writeln!(f, "Restored backup {}:", entry.id)?;
                for path in entry.paths() {
                    writeln!(f, "- `{}`", path.display())?;
                }
                Ok(())
            }
            RollbackOutcome::AlreadyRestored { id } => {
                writeln!(f, "Backup {id} was already restored; nothing changed.")
            }
        }
    }
}
