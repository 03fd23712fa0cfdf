//! Step model definition and related functionality.

use serde::{Deserialize, Serialize};

use super::{StepKind, StepStatus};
use crate::error::{Result, TermoraError};

/// One unit of work within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Unique identifier for the step (0 until the plan is persisted)
    #[serde(default)]
    pub id: u64,

    /// ID of the parent plan
    #[serde(default)]
    pub plan_id: u64,

    /// Position of the step within the plan (0-indexed)
    #[serde(default)]
    pub position: u32,

    /// Payload type
    pub kind: StepKind,

    /// Command line, script body or schedule specification
    pub payload: String,

    /// Interpreter for script steps (`sh` when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,

    /// What the step is expected to do
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    /// Estimated risk that the step mutates or deletes user data
    #[serde(default)]
    pub destructive: bool,

    /// Runs even when an earlier step failed
    #[serde(default)]
    pub independent: bool,

    /// Explicit confirmation was granted for this step
    #[serde(default)]
    pub confirmed: bool,

    /// Current execution status
    #[serde(default)]
    pub status: StepStatus,

    /// Exit code of the subprocess, if it ran to completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Captured standard output
    #[serde(default)]
    pub stdout: String,

    /// Captured standard error
    #[serde(default)]
    pub stderr: String,

    /// Wall-clock duration of the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Backup taken before the step ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<u64>,
}

impl Step {
    /// Creates a pending step of the given kind.
    pub fn new(kind: StepKind, payload: impl Into<String>) -> Self {
        Self {
            id: 0,
            plan_id: 0,
            position: 0,
            kind,
            payload: payload.into(),
            interpreter: None,
            explanation: None,
            destructive: false,
            independent: false,
            confirmed: false,
            status: StepStatus::Pending,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: None,
            backup_id: None,
        }
    }

    /// Shell command step.
    pub fn shell(payload: impl Into<String>) -> Self {
        Self::new(StepKind::ShellCommand, payload)
    }

    /// Script step run by `interpreter`.
    pub fn script(interpreter: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            interpreter: Some(interpreter.into()),
            ..Self::new(StepKind::Script, body)
        }
    }

    /// Marks the step as destructive.
    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    /// Marks the step as independent of earlier failures.
    pub fn independent(mut self) -> Self {
        self.independent = true;
        self
    }

    /// Moves the step forward, rejecting any backwards transition.
    pub fn transition(&mut self, next: StepStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(TermoraError::invalid_state(format!(
                "step {} cannot move from {} to {}",
                self.position,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Single-line summary used in previews and prompts.
    pub fn summary(&self) -> String {
        let first_line = self.payload.lines().next().unwrap_or_default();
        match self.kind {
            StepKind::ShellCommand => format!("$ {first_line}"),
            StepKind::Script => format!(
                "[{} script] {first_line}",
                self.interpreter.as_deref().unwrap_or("sh")
            ),
            StepKind::ScheduleDefinition => format!("[schedule] {first_line}"),
        }
    }
}
