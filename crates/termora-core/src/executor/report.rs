//! Execution results returned to callers.

use crate::{error::TermoraError, models::RollbackOutcome};

/// How a call to [`super::Executor::execute`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Every step succeeded
    Completed,
    /// A destructive step needs an explicit grant before it runs
    Suspended { step_index: usize, preview: String },
    /// A step failed; later dependent steps were skipped
    Failed {
        step_index: usize,
        payload: String,
        stderr: String,
        cause: String,
        /// Automatic rollback of the failed step's backup, if the plan asked
        /// for one
        rollback: Option<RollbackOutcome>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub plan_id: u64,
    pub outcome: ExecutionOutcome,
}

impl ExecutionReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Completed)
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Suspended { .. })
    }

    /// The failure as an error, for callers that want `?`.
    pub fn failure(&self) -> Option<TermoraError> {
        match &self.outcome {
            ExecutionOutcome::Failed {
                step_index,
                payload,
                stderr,
                cause,
                ..
            } => Some(TermoraError::StepExecutionFailure {
                index: *step_index,
                payload: payload.clone(),
                stderr: stderr.clone(),
                cause: cause.clone(),
            }),
            _ => None,
        }
    }
}
