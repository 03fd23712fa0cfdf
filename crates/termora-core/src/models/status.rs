//! Status enumerations for plans and steps.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Proposed, or suspended waiting for a step confirmation
    #[default]
    Pending,

    /// Confirmed by the user and ready to run
    Confirmed,

    /// Steps are being executed
    Executing,

    /// Every step succeeded
    Completed,

    /// At least one step failed
    Failed,

    /// Failed and the failing step was rolled back
    RolledBack,

    /// Cancelled by the caller before it finished
    Cancelled,
}

impl PlanStatus {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Confirmed => "confirmed",
            PlanStatus::Executing => "executing",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::RolledBack => "rolled_back",
            PlanStatus::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed
                | PlanStatus::Failed
                | PlanStatus::RolledBack
                | PlanStatus::Cancelled
        )
    }

    /// Legal plan transitions.
    ///
    /// `Executing -> Pending` is the suspension at a step that still needs
    /// confirmation; `Failed -> RolledBack` follows an automatic rollback.
    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        use PlanStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Executing)
                | (Confirmed, Cancelled)
                | (Executing, Pending)
                | (Executing, Completed)
                | (Executing, Failed)
                | (Failed, RolledBack)
        )
    }
}

impl FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PlanStatus::Pending),
            "confirmed" => Ok(PlanStatus::Confirmed),
            "executing" => Ok(PlanStatus::Executing),
            "completed" => Ok(PlanStatus::Completed),
            "failed" => Ok(PlanStatus::Failed),
            "rolled_back" | "rolledback" => Ok(PlanStatus::RolledBack),
            "cancelled" | "canceled" => Ok(PlanStatus::Cancelled),
            _ => Err(format!("Invalid plan status: {s}")),
        }
    }
}

/// Execution status of a single step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not started yet
    #[default]
    Pending,

    /// Subprocess in flight
    Running,

    /// Exited zero and was recorded
    Succeeded,

    /// Non-zero exit, timeout, spawn error or unrecorded
    Failed,

    /// Never ran because an earlier step failed or the plan was cancelled
    Skipped,
}

impl StepStatus {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Step statuses only move forward: `pending -> running -> {succeeded,
    /// failed}` or `pending -> skipped`.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Skipped) | (Running, Succeeded) | (Running, Failed)
        )
    }

    /// Whether the step reached an end state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped
        )
    }

    /// Get status with consistent icon formatting for display.
    ///
    /// ```rust
    /// use termora_core::models::StepStatus;
    ///
    /// assert_eq!(StepStatus::Succeeded.with_icon(), "✓ Succeeded");
    /// assert_eq!(StepStatus::Failed.with_icon(), "✗ Failed");
    /// ```
    pub fn with_icon(&self) -> &'static str {
        match self {
            StepStatus::Pending => "○ Pending",
            StepStatus::Running => "➤ Running",
            StepStatus::Succeeded => "✓ Succeeded",
            StepStatus::Failed => "✗ Failed",
            StepStatus::Skipped => "– Skipped",
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "succeeded" => Ok(StepStatus::Succeeded),
            "failed" => Ok(StepStatus::Failed),
            "skipped" => Ok(StepStatus::Skipped),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

/// What a step's payload is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// A single shell command line run through `sh -c`
    #[default]
    ShellCommand,

    /// A script body run by an interpreter
    Script,

    /// A recurring-task registration
    ScheduleDefinition,
}

impl StepKind {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::ShellCommand => "shell_command",
            StepKind::Script => "script",
            StepKind::ScheduleDefinition => "schedule_definition",
        }
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shell_command" | "shell" | "command" => Ok(StepKind::ShellCommand),
            // the original provider prompt called scripts `python_code`
            "script" | "python_code" => Ok(StepKind::Script),
            "schedule_definition" | "schedule" => Ok(StepKind::ScheduleDefinition),
            _ => Err(format!("Invalid step kind: {s}")),
        }
    }
}

/// What happens when a step fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Skip the remaining steps and leave everything as is
    #[default]
    Halt,

    /// Also restore the failed step's own backup
    HaltAndRollback,
}

impl FailurePolicy {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Halt => "halt",
            FailurePolicy::HaltAndRollback => "halt_and_rollback",
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "halt" => Ok(FailurePolicy::Halt),
            "halt_and_rollback" | "rollback" => Ok(FailurePolicy::HaltAndRollback),
            _ => Err(format!("Invalid failure policy: {s}")),
        }
    }
}
