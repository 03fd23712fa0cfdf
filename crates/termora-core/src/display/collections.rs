//! Newtype wrappers for displaying groups of domain objects.
//!
//! Each wrapper prints its items in order and a single line when empty.

use std::fmt;

use crate::models::{BackupEntry, CommandRecord, Plan, ScheduleEntry};

/// Command history, most recent (or most similar) first.
///
/// ```rust
/// use termora_core::display::Records;
///
/// assert_eq!(Records(vec![]).to_string(), "No history found.\n");
/// ```
pub struct Records(pub Vec<CommandRecord>);

impl Records {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandRecord> {
        self.0.iter()
    }
}

impl fmt::Display for Records {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No history found.");
        }
        for record in &self.0 {
            write!(f, "{record}")?;
        }
        Ok(())
    }
}

pub struct Backups(pub Vec<BackupEntry>);

impl Backups {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Backups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No backups found.");
        }
        for entry in &self.0 {
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

pub struct Schedules(pub Vec<ScheduleEntry>);

impl Schedules {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Schedules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No schedules registered.");
        }
        for entry in &self.0 {
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// Compact plan list: one line per plan.
pub struct Plans(pub Vec<Plan>);

impl fmt::Display for Plans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No plans found.");
        }
        for plan in &self.0 {
            writeln!(
                f,
                "- **{}** {} ({}, {} step{})",
                plan.id,
                plan.intent,
                plan.status,
                plan.steps.len(),
                if plan.steps.len() == 1 { "" } else { "s" }
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::{
        models::{Outcome, ScheduleTemplate, Step, StepKind},
        scheduler::TriggerRule,
    };

    fn record() -> CommandRecord {
        CommandRecord {
            id: 7,
            intent: "list rust files".to_string(),
            plan_id: Some(1),
            step_id: Some(1),
            step_kind: StepKind::ShellCommand,
            payload: "find . -name '*.rs'".to_string(),
            directory: "/work/widgets".to_string(),
            project: Some("widgets".to_string()),
            tags: vec!["rust".to_string()],
            outcome: Outcome::Success,
            exit_code: Some(0),
            output: String::new(),
            duration_ms: Some(12),
            recorded_at: Timestamp::from_second(1_700_000_000).unwrap(),
        }
    }

    #[test]
    fn test_records_display() {
        let output = Records(vec![record()]).to_string();
        assert!(output.contains("✓ `find . -name '*.rs'` (ID: 7)"));
        assert!(output.contains("**Project**: widgets"));
    }

    #[test]
    fn test_schedules_display() {
        let entry = ScheduleEntry {
            id: 2,
            description: "every day at 09:00".to_string(),
            rule: TriggerRule::Daily { hour: 9, minute: 0 },
            template: ScheduleTemplate::Plan(vec![Step::shell("df -h")]),
            enabled: false,
            last_fired_at: None,
            created_at: Timestamp::from_second(1_700_000_000).unwrap(),
        };
        let output = Schedules(vec![entry]).to_string();
        assert!(output.contains("Schedule 2: every day at 09:00 (disabled)"));
        assert!(output.contains("`$ df -h`"));
        assert!(output.contains("never"));
        assert_eq!(Schedules(vec![]).to_string(), "No schedules registered.\n");
    }

    #[test]
    fn test_plans_display() {
        let plan = Plan::new("tidy", vec![Step::shell("ls")]);
        assert!(Plans(vec![plan]).to_string().contains("tidy (pending, 1 step)"));
    }
}
