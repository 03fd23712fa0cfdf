//! Command history records.

use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::StepKind;

/// Longest stdout excerpt kept in a record.
pub const OUTPUT_EXCERPT_CHARS: usize = 1000;

/// Result of an executed step as seen by history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            _ => Err(format!("Invalid outcome: {s}")),
        }
    }
}

/// Immutable log entry describing one executed step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRecord {
    pub id: u64,
    pub intent: String,
    pub plan_id: Option<u64>,
    pub step_id: Option<u64>,
    pub step_kind: StepKind,
    pub payload: String,
    /// Working directory the step ran in
    pub directory: String,
    /// Detected project name, if any
    pub project: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub outcome: Outcome,
    pub exit_code: Option<i32>,
    /// First [`OUTPUT_EXCERPT_CHARS`] characters of stdout
    #[serde(default)]
    pub output: String,
    pub duration_ms: Option<u64>,
    pub recorded_at: Timestamp,
}

/// Record about to be appended; the store assigns `id` and `recorded_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCommandRecord {
    pub intent: String,
    pub plan_id: Option<u64>,
    pub step_id: Option<u64>,
    pub step_kind: StepKind,
    pub payload: String,
    pub directory: String,
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub outcome: Outcome,
    pub exit_code: Option<i32>,
    pub output: String,
    pub duration_ms: Option<u64>,
}

impl NewCommandRecord {
    /// Truncates `output` to the excerpt length on a char boundary.
    pub fn excerpt(output: &str) -> String {
        output.chars().take(OUTPUT_EXCERPT_CHARS).collect()
    }
}
