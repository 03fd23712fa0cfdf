//! Request lifecycle: intent, plan, confirmation, execution.
//!
//! ```text
//! collecting_intent ─▶ planning ─▶ awaiting_confirmation ─▶ executing ─┬─▶ completed
//!                         │              ▲    │                      ├─▶ failed
//!                         ▼              └────┼── suspended ◀────────┘
//!                       failed                ▼
//!                                         cancelled
//! ```
//!
//! The orchestrator holds no lock across the planning call or while a run
//! waits for confirmation; an [`AgentRun`] is plain data the caller keeps.

use std::{fmt, sync::Arc, time::Duration};

use jiff::Zoned;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    context::SessionContext,
    error::{Result, TermoraError},
    executor::{ExecutionOutcome, ExecutionReport, Executor},
    memory::MemoryStore,
    models::{
        NewScheduleEntry, Plan, PlanStatus, RecordFilter, ScheduleEntry, ScheduleTemplate,
    },
    planning::{PlanProvider, PlanRequest},
    scheduler::detect_recurrence,
    store::Store,
};

/// Past records attached to a planning request.
const HISTORY_CONTEXT_RECORDS: usize = 5;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    CollectingIntent,
    Planning,
    AwaitingConfirmation,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::CollectingIntent => "collecting_intent",
            RequestState::Planning => "planning",
            RequestState::AwaitingConfirmation => "awaiting_confirmation",
            RequestState::Executing => "executing",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
            RequestState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request as it moves through the agent.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub state: RequestState,
    pub intent: String,
    pub context: SessionContext,
    pub plan: Plan,
    /// Result of the latest execution attempt
    pub report: Option<ExecutionReport>,
    /// Schedule registered because the intent asked for recurrence
    pub schedule: Option<ScheduleEntry>,
    register_recurrence: bool,
}

impl AgentRun {
    /// Index and preview of the step waiting for a grant.
    pub fn suspended_step(&self) -> Option<(usize, &str)> {
        match self.report.as_ref().map(|report| &report.outcome) {
            Some(ExecutionOutcome::Suspended {
                step_index,
                preview,
            }) => Some((*step_index, preview.as_str())),
            _ => None,
        }
    }
}

/// Knobs the agent takes from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub planning_timeout: Duration,
    pub command_timeout: Duration,
    pub send_to_api: bool,
    pub backup_enabled: bool,
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AgentSettings {
    fn from(config: &Config) -> Self {
        Self {
            planning_timeout: Duration::from_secs(config.planning_timeout_secs),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            send_to_api: config.send_to_api,
            backup_enabled: config.backup_enabled,
            provider: config.ai_provider.clone(),
            model: config.ai_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Outcome of one due schedule in [`Agent::run_due`].
#[derive(Debug)]
pub struct ScheduledRun {
    pub schedule_id: u64,
    pub result: Result<AgentRun>,
}

/// Drives requests from intent to execution.
#[derive(Clone)]
pub struct Agent {
    store: Store,
    memory: Arc<dyn MemoryStore>,
    provider: Arc<dyn PlanProvider>,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(store: Store, provider: Arc<dyn PlanProvider>) -> Self {
        let memory: Arc<dyn MemoryStore> = Arc::new(store.clone());
        Self {
            store,
            memory,
            provider,
            settings: AgentSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the history backend (the store itself by default).
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = memory;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Plans `intent` and stores the plan as pending.
    ///
    /// # Errors
    ///
    /// `PlanningTimeout` when the provider does not answer in time,
    /// `PlanningFailure` when it fails, and `MalformedPlan` when its answer
    /// is not executable. Nothing is persisted or recorded in those cases.
    pub async fn propose(&self, intent: &str, context: &SessionContext) -> Result<AgentRun> {
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(TermoraError::invalid_input("intent").with_reason("must not be empty"));
        }
        let mut state = RequestState::CollectingIntent;
        debug!("Request state {state}: '{intent}'");

        state = RequestState::Planning;
        let request = self.planning_request(intent, context).await;
        debug!(
            "Request state {state}: {} similar record(s) attached",
            request.history.len()
        );

        let proposal = tokio::time::timeout(
            self.settings.planning_timeout,
            self.provider.propose_plan(&request),
        )
        .await
        .map_err(|_| {
            warn!("Planning timed out for '{intent}'");
            TermoraError::PlanningTimeout {
                seconds: self.settings.planning_timeout.as_secs(),
            }
        })??;

        let plan = Plan::from_proposal(intent, proposal);
        plan.validate()?;
        let plan = self.store.save_plan(plan).await?;
        info!("Plan {} proposed with {} step(s)", plan.id, plan.steps.len());

        Ok(AgentRun {
            state: RequestState::AwaitingConfirmation,
            intent: intent.to_string(),
            context: context.clone(),
            plan,
            report: None,
            schedule: None,
            register_recurrence: true,
        })
    }

    /// Confirms the run's plan and executes it.
    ///
    /// A suspension leaves the run in `awaiting_confirmation`; grant the
    /// step with [`Agent::confirm_step`].
    pub async fn confirm(&self, run: &mut AgentRun, auto_confirm: bool) -> Result<ExecutionReport> {
        Self::expect_awaiting(run)?;
        if !auto_confirm && run.plan.status == PlanStatus::Pending {
            run.plan.transition(PlanStatus::Confirmed)?;
        }
        self.execute(run, auto_confirm).await
    }

    /// Grants the suspended step and resumes execution.
    pub async fn confirm_step(&self, run: &mut AgentRun) -> Result<ExecutionReport> {
        Self::expect_awaiting(run)?;
        let (index, _) = run.suspended_step().ok_or_else(|| {
            TermoraError::invalid_state(format!("plan {} has no suspended step", run.plan.id))
        })?;
        self.executor(&run.context)
            .confirm_step(&mut run.plan, index)
            .await?;
        self.execute(run, false).await
    }

    /// Cancels a run that is waiting for confirmation.
    pub async fn cancel(&self, run: &mut AgentRun) -> Result<()> {
        Self::expect_awaiting(run)?;
        self.executor(&run.context).cancel(&mut run.plan).await?;
        run.state = RequestState::Cancelled;
        Ok(())
    }

    /// Proposes and immediately executes `intent`, for callers that already
    /// hold the user's go-ahead. Destructive steps still suspend unless
    /// `auto_confirm` is set.
    pub async fn handle(
        &self,
        intent: &str,
        context: &SessionContext,
        auto_confirm: bool,
    ) -> Result<AgentRun> {
        let mut run = self.propose(intent, context).await?;
        self.confirm(&mut run, auto_confirm).await?;
        Ok(run)
    }

    /// Fires every schedule due at `now` once and marks it fired.
    ///
    /// A failing run does not stop the others; each result is reported.
    pub async fn run_due(
        &self,
        now: &Zoned,
        context: &SessionContext,
        auto_confirm: bool,
    ) -> Result<Vec<ScheduledRun>> {
        let registry = self.store.schedule_registry().await?;
        let due: Vec<ScheduleEntry> = registry.list_due(now).into_iter().cloned().collect();
        let mut runs = Vec::with_capacity(due.len());

        for entry in due {
            info!("Schedule {} due: {}", entry.id, entry.description);
            let result = self.fire(&entry, context, auto_confirm).await;
            if let Err(ref e) = result {
                warn!("Schedule {} run failed: {e}", entry.id);
            }
            self.store.mark_fired(entry.id, now.timestamp()).await?;
            runs.push(ScheduledRun {
                schedule_id: entry.id,
                result,
            });
        }

        Ok(runs)
    }

    async fn fire(
        &self,
        entry: &ScheduleEntry,
        context: &SessionContext,
        auto_confirm: bool,
    ) -> Result<AgentRun> {
        let mut run = match &entry.template {
            ScheduleTemplate::Intent(intent) => self.propose(intent, context).await?,
            ScheduleTemplate::Plan(steps) => {
                let plan = Plan::new(entry.template.intent_text(), steps.clone());
                plan.validate()?;
                AgentRun {
                    state: RequestState::AwaitingConfirmation,
                    intent: plan.intent.clone(),
                    context: context.clone(),
                    plan: self.store.save_plan(plan).await?,
                    report: None,
                    schedule: None,
                    register_recurrence: false,
                }
            }
        };
        run.register_recurrence = false;
        self.confirm(&mut run, auto_confirm).await?;
        Ok(run)
    }

    async fn execute(&self, run: &mut AgentRun, auto_confirm: bool) -> Result<ExecutionReport> {
        run.state = RequestState::Executing;
        let report = match self
            .executor(&run.context)
            .execute(&mut run.plan, auto_confirm)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                run.state = RequestState::Failed;
                return Err(e);
            }
        };

        run.state = match report.outcome {
            ExecutionOutcome::Completed => RequestState::Completed,
            ExecutionOutcome::Suspended { .. } => RequestState::AwaitingConfirmation,
            ExecutionOutcome::Failed { .. } => RequestState::Failed,
        };
        run.report = Some(report.clone());
        debug!("Request state {}", run.state);

        if run.state == RequestState::Completed && run.register_recurrence {
            run.schedule = self.register_recurrence(&run.intent, &run.plan).await;
        }
        Ok(report)
    }

    /// Registers a schedule when the intent names a recurrence the plan
    /// did not already register itself.
    async fn register_recurrence(&self, intent: &str, plan: &Plan) -> Option<ScheduleEntry> {
        if plan.has_schedule_step() {
            return None;
        }
        let found = detect_recurrence(intent)?;
        let remainder = intent.replacen(&found.phrase, "", 1);
        let entry = NewScheduleEntry::from_intent(&found.phrase, remainder.trim_matches([' ', ',']))
            .ok()?;
        match self.store.register_schedule(entry).await {
            Ok(schedule) => {
                info!(
                    "Registered schedule {} for '{}'",
                    schedule.id, schedule.description
                );
                Some(schedule)
            }
            Err(e) => {
                warn!("Could not register schedule for plan {}: {e}", plan.id);
                None
            }
        }
    }

    async fn planning_request(&self, intent: &str, context: &SessionContext) -> PlanRequest {
        let filter =
            RecordFilter::similar_to(intent, HISTORY_CONTEXT_RECORDS).in_project(context.project.clone());
        let mut history = match self.memory.query(filter).await {
            Ok(history) => history,
            Err(e) => {
                warn!("History lookup failed, planning without it: {e}");
                Vec::new()
            }
        };
        let mut context = context.clone();
        if !self.settings.send_to_api {
            for record in &mut history {
                record.output.clear();
            }
            context = context.without_private();
        }

        PlanRequest {
            provider: self.settings.provider.clone(),
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            ..PlanRequest::new(intent, context)
        }
        .with_history(history)
    }

    fn executor(&self, context: &SessionContext) -> Executor {
        Executor::new(self.store.clone(), self.memory.clone(), context.clone())
            .with_command_timeout(self.settings.command_timeout)
            .with_backups(self.settings.backup_enabled)
    }

    fn expect_awaiting(run: &AgentRun) -> Result<()> {
        if run.state != RequestState::AwaitingConfirmation {
            return Err(TermoraError::invalid_state(format!(
                "request for plan {} is {}, not awaiting confirmation",
                run.plan.id, run.state
            )));
        }
        Ok(())
    }
}
