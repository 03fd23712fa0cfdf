//! Provider output and its normalization into a [`Plan`].

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, TermoraError},
    executor::paths::is_destructive_command,
    models::{FailurePolicy, Plan, Step, StepKind},
};

/// Interpreter for `python_code` actions.
const PYTHON_INTERPRETER: &str = "python3";

/// Interpreters whose scripts are shell code the heuristic can read.
const POSIX_SHELLS: &[&str] = &["sh", "bash", "dash", "zsh", "ksh", "ash"];

/// `None` runs under `sh`. Accepts paths and `env` forms such as
/// `/usr/bin/env bash`.
fn is_posix_shell(interpreter: Option<&str>) -> bool {
    let Some(interpreter) = interpreter else {
        return true;
    };
    let program = interpreter
        .split_whitespace()
        .map(|word| word.rsplit('/').next().unwrap_or(word))
        .find(|name| *name != "env");
    program.is_none_or(|name| POSIX_SHELLS.contains(&name))
}

/// Kind of a proposed action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ShellCommand,
    PythonCode,
    Script,
    #[serde(alias = "schedule_definition")]
    Schedule,
}

/// One action as a provider describes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Provider's own estimate; OR-ed with the built-in heuristic
    #[serde(default)]
    pub destructive: bool,
    #[serde(default)]
    pub independent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    /// Packages a script needs; informational only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl ProposedAction {
    pub fn shell(content: impl Into<String>) -> Self {
        Self {
            action_type: ActionType::ShellCommand,
            content: content.into(),
            explanation: None,
            destructive: false,
            independent: false,
            interpreter: None,
            dependencies: Vec::new(),
        }
    }
}

/// A provider's answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProposedPlan {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub actions: Vec<ProposedAction>,
    #[serde(default)]
    pub requires_backup: bool,
    #[serde(default)]
    pub backup_paths: Vec<String>,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl ProposedPlan {
    /// Parses a plan from provider text that may wrap the JSON in prose or
    /// a code fence.
    pub fn parse(text: &str) -> Result<Self> {
        let json = extract_json(text)
            .ok_or_else(|| TermoraError::malformed("no JSON object in planner response"))?;
        serde_json::from_str(json)
            .map_err(|e| TermoraError::malformed(format!("unreadable planner response: {e}")))
    }
}

/// The span from the first `{` to the last `}`.
///
/// ```rust
/// use termora_core::planning::extract_json;
///
/// let text = "Sure! ```json\n{\"actions\": []}\n``` Done.";
/// assert_eq!(extract_json(text), Some("{\"actions\": []}"));
/// assert_eq!(extract_json("no braces here"), None);
/// ```
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

impl Plan {
    /// Builds a pending plan from provider output.
    ///
    /// A step is destructive when the provider says so, when the plan asks
    /// for a backup, or when [`is_destructive_command`] flags the payload
    /// (for scripts, only shell scripts are inspected).
    pub fn from_proposal(intent: impl Into<String>, proposal: ProposedPlan) -> Self {
        let requires_backup = proposal.requires_backup;
        let steps = proposal
            .actions
            .into_iter()
            .map(|action| {
                let kind = match action.action_type {
                    ActionType::ShellCommand => StepKind::ShellCommand,
                    ActionType::PythonCode | ActionType::Script => StepKind::Script,
                    ActionType::Schedule => StepKind::ScheduleDefinition,
                };
                let interpreter = match action.action_type {
                    ActionType::PythonCode => Some(
                        action
                            .interpreter
                            .unwrap_or_else(|| PYTHON_INTERPRETER.to_string()),
                    ),
                    ActionType::Script => action.interpreter,
                    _ => None,
                };
                let destructive = match kind {
                    StepKind::ScheduleDefinition => false,
                    StepKind::ShellCommand => {
                        action.destructive
                            || requires_backup
                            || is_destructive_command(&action.content)
                    }
                    StepKind::Script => {
                        action.destructive
                            || requires_backup
                            || (is_posix_shell(interpreter.as_deref())
                                && is_destructive_command(&action.content))
                    }
                };
                Step {
                    interpreter,
                    explanation: action.explanation,
                    destructive,
                    independent: action.independent,
                    ..Step::new(kind, action.content)
                }
            })
            .collect();

        let mut plan = Plan::new(intent, steps).with_failure_policy(proposal.on_failure);
        if !proposal.explanation.trim().is_empty() {
            plan.explanation = Some(proposal.explanation);
        }
        plan
    }
}
