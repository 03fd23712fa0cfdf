//! Plan model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{FailurePolicy, PlanStatus, ScheduleSpec, Step, StepKind, StepStatus};
use crate::error::{Result, TermoraError};

/// What the agent intends to do for one request.
///
/// A plan is immutable once confirmed except for status transitions and the
/// execution results written into its steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Unique identifier for the plan (0 until persisted)
    #[serde(default)]
    pub id: u64,

    /// Originating intent text
    pub intent: String,

    /// Planner's explanation of the approach
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    /// Overall status
    #[serde(default)]
    pub status: PlanStatus,

    /// Behaviour when a step fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Timestamp when the plan was created (UTC)
    pub created_at: Timestamp,

    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    /// Creates a pending plan; positions are assigned from the step order.
    pub fn new(intent: impl Into<String>, steps: Vec<Step>) -> Self {
        let mut plan = Self {
            id: 0,
            intent: intent.into(),
            explanation: None,
            status: PlanStatus::Pending,
            failure_policy: FailurePolicy::Halt,
            created_at: Timestamp::now(),
            steps,
        };
        plan.renumber();
        plan
    }

    /// Sets the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets the explanation.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    fn renumber(&mut self) {
        for (position, step) in self.steps.iter_mut().enumerate() {
            step.position = position as u32;
        }
    }

    /// Checks the plan is executable: at least one step, no empty payloads
    /// and parseable schedule definitions.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(TermoraError::malformed("plan has no steps"));
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.payload.trim().is_empty() {
                return Err(TermoraError::malformed(format!(
                    "step {index} has an empty payload"
                )));
            }
            if step.kind == StepKind::ScheduleDefinition {
                ScheduleSpec::parse(&step.payload).map_err(|e| {
                    TermoraError::malformed(format!("step {index}: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Moves the plan to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: PlanStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(TermoraError::invalid_state(format!(
                "plan {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Index of the first step that has not reached an end state.
    pub fn next_pending(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.status == StepStatus::Pending)
    }

    /// Whether any step is marked destructive.
    pub fn has_destructive_steps(&self) -> bool {
        self.steps.iter().any(|step| step.destructive)
    }

    /// Whether any step registers a schedule.
    pub fn has_schedule_step(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.kind == StepKind::ScheduleDefinition)
    }
}
