//! Recurring task definitions.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::Step;
use crate::{
    error::{Result, TermoraError},
    scheduler::trigger::{self, TriggerRule},
};

/// What runs when a schedule fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScheduleTemplate {
    /// Re-plan this intent at fire time
    Intent(String),
    /// Run these steps as a fresh plan
    Plan(Vec<Step>),
}

impl ScheduleTemplate {
    /// Intent text used for records and display.
    pub fn intent_text(&self) -> String {
        match self {
            ScheduleTemplate::Intent(text) => text.clone(),
            ScheduleTemplate::Plan(steps) => steps
                .iter()
                .map(|step| step.payload.lines().next().unwrap_or_default().to_string())
                .collect::<Vec<_>>()
                .join(" && "),
        }
    }
}

/// A stored recurring trigger paired with a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub id: u64,
    /// Trigger as the user wrote it
    pub description: String,
    pub rule: TriggerRule,
    pub template: ScheduleTemplate,
    pub enabled: bool,
    pub last_fired_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Schedule about to be registered.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduleEntry {
    pub description: String,
    pub rule: TriggerRule,
    pub template: ScheduleTemplate,
}

impl NewScheduleEntry {
    /// Parses `trigger` and pairs it with an intent template.
    pub fn from_intent(trigger_text: &str, intent: &str) -> Result<Self> {
        let rule = trigger::parse(trigger_text)?;
        if intent.trim().is_empty() {
            return Err(TermoraError::invalid_input("intent").with_reason("must not be empty"));
        }
        Ok(Self {
            description: trigger_text.trim().to_string(),
            rule,
            template: ScheduleTemplate::Intent(intent.trim().to_string()),
        })
    }
}

/// Payload of a `schedule_definition` step.
///
/// Either JSON (`{"trigger": "...", "intent": "..."}` or with `steps`
/// instead of `intent`) or free text containing a trigger phrase, such as
/// `every day at 09:00 clean the downloads folder`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSpec {
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
}

impl ScheduleSpec {
    /// Parses a step payload.
    pub fn parse(payload: &str) -> Result<Self> {
        let trimmed = payload.trim();
        if trimmed.starts_with('{') {
            let spec: ScheduleSpec = serde_json::from_str(trimmed)?;
            trigger::parse(&spec.trigger)?;
            if spec.intent.as_deref().is_none_or(|i| i.trim().is_empty())
                && spec.steps.as_ref().is_none_or(Vec::is_empty)
            {
                return Err(TermoraError::invalid_input("schedule")
                    .with_reason("needs an intent or steps"));
            }
            return Ok(spec);
        }

        let found = trigger::detect_recurrence(trimmed).ok_or_else(|| {
            TermoraError::invalid_input("schedule").with_reason("no trigger phrase found")
        })?;
        let intent = trimmed.replacen(&found.phrase, "", 1);
        let intent = intent.trim().trim_matches(',').trim();
        if intent.is_empty() {
            return Err(TermoraError::invalid_input("schedule").with_reason("needs an intent"));
        }
        Ok(Self {
            trigger: found.phrase,
            intent: Some(intent.to_string()),
            steps: None,
        })
    }

    /// Converts the spec into a registrable entry.
    pub fn into_entry(self) -> Result<NewScheduleEntry> {
        let rule = trigger::parse(&self.trigger)?;
        let template = match (self.steps, self.intent) {
            (Some(steps), _) if !steps.is_empty() => ScheduleTemplate::Plan(steps),
            (_, Some(intent)) => ScheduleTemplate::Intent(intent),
            _ => {
                return Err(TermoraError::invalid_input("schedule")
                    .with_reason("needs an intent or steps"));
            }
        };
        Ok(NewScheduleEntry {
            description: self.trigger,
            rule,
            template,
        })
    }
}
