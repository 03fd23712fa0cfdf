//! Turning an intent into a proposed plan.
//!
//! The orchestrator calls a [`PlanProvider`] exactly once per request. The
//! provider sees the intent, the session context and similar past records;
//! what it returns is normalized by [`Plan::from_proposal`](crate::models::Plan::from_proposal)
//! and validated before anything is persisted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::SessionContext, error::Result, models::CommandRecord};

pub mod direct;
pub mod process;
pub mod proposal;

pub use direct::{DirectCommandProvider, is_direct_command};
pub use process::ProcessProvider;
pub use proposal::{ActionType, ProposedAction, ProposedPlan, extract_json};

/// Everything a provider gets to work with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRequest {
    pub intent: String,
    pub context: SessionContext,
    /// Most similar past records, best match first
    #[serde(default)]
    pub history: Vec<CommandRecord>,
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl PlanRequest {
    pub fn new(intent: impl Into<String>, context: SessionContext) -> Self {
        Self {
            intent: intent.into(),
            context,
            history: Vec::new(),
            provider: "groq".to_string(),
            model: "llama3-70b-8192".to_string(),
            max_tokens: 2000,
            temperature: 0.7,
        }
    }

    pub fn with_history(mut self, history: Vec<CommandRecord>) -> Self {
        self.history = history;
        self
    }
}

/// Source of plans.
#[async_trait]
pub trait PlanProvider: Send + Sync {
    async fn propose_plan(&self, request: &PlanRequest) -> Result<ProposedPlan>;
}
