//! Command handlers.
//!
//! Each handler calls into the core, formats the result with the core's
//! markdown display types and hands it to the renderer. Interactive
//! confirmation reads from standard input; end of input counts as "no".

use anyhow::{Context, Result, bail};
use jiff::{SignedDuration, Timestamp, Zoned};
use log::{debug, info};
use termora_core::{
    Agent, BackupManager, Config, MemoryStore, SessionContext, Store,
    display::{
        Backups, ExecutionSummary, OperationStatus, PruneResult, Records, ScheduleRuns, Schedules,
    },
    executor::ExecutionOutcome,
    models::{NewScheduleEntry, RecordFilter},
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::{
    args::{
        AddScheduleArgs, BackupsArgs, ChatArgs, HistoryArgs, RollbackArgs, RollbackTarget,
        ScheduleCommands,
    },
    renderer::TerminalRenderer,
};

const EXIT_WORDS: &[&str] = &["exit", "quit", "bye"];

/// How a single request ended, for the exit status of one-shot chats.
enum ChatResult {
    Done,
    Failed(u64),
    Declined,
}

pub struct Cli {
    agent: Agent,
    context: SessionContext,
    renderer: TerminalRenderer,
    auto_confirm: bool,
    input: Lines<BufReader<Stdin>>,
}

impl Cli {
    pub fn new(
        agent: Agent,
        context: SessionContext,
        renderer: TerminalRenderer,
        config: &Config,
    ) -> Self {
        Self {
            agent,
            context,
            renderer,
            auto_confirm: config.auto_confirm,
            input: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    fn store(&self) -> &Store {
        self.agent.store()
    }

    fn success(&self, message: String) -> Result<()> {
        self.renderer
            .render(&OperationStatus::success(message).to_string())
    }

    pub async fn handle_chat(&mut self, args: ChatArgs) -> Result<()> {
        let auto = args.auto || self.auto_confirm;
        if let Some(intent) = args.intent() {
            return match self.chat_once(&intent, auto).await? {
                ChatResult::Failed(plan_id) => bail!("Plan {plan_id} failed"),
                ChatResult::Done | ChatResult::Declined => Ok(()),
            };
        }

        self.renderer
            .render("Termora is ready. Type a request, or `exit` to leave.\n")?;
        loop {
            self.renderer.prompt("termora> ")?;
            let Some(line) = self.read_line().await? else {
                println!();
                break;
            };
            let intent = line.trim();
            if intent.is_empty() {
                continue;
            }
            if EXIT_WORDS.contains(&intent.to_lowercase().as_str()) {
                break;
            }
            // One bad request should not end the session
            if let Err(e) = self.chat_once(intent, auto).await {
                self.renderer
                    .render(&OperationStatus::failure(format!("{e:#}")).to_string())?;
            }
        }
        Ok(())
    }

    async fn chat_once(&mut self, intent: &str, auto: bool) -> Result<ChatResult> {
        let mut run = self
            .agent
            .propose(intent, &self.context)
            .await
            .context("Failed to plan request")?;
        self.renderer.render(&run.plan.to_string())?;

        if !auto && !self.ask("Proceed? [y/N] ").await? {
            self.agent.cancel(&mut run).await?;
            self.success(format!("Plan {} cancelled", run.plan.id))?;
            return Ok(ChatResult::Declined);
        }

        let mut report = self.agent.confirm(&mut run, auto).await?;
        while let Some((index, preview)) = run
            .suspended_step()
            .map(|(index, preview)| (index, preview.to_string()))
        {
            let warning = format!(
                "Step {} may destroy data and will be backed up first:\n\n    {preview}\n",
                index + 1
            );
            self.renderer.render(&warning)?;
            if !self.ask("Run this step? [y/N] ").await? {
                self.agent.cancel(&mut run).await?;
                self.success(format!("Plan {} cancelled", run.plan.id))?;
                return Ok(ChatResult::Declined);
            }
            report = self.agent.confirm_step(&mut run).await?;
        }

        self.renderer
            .render(&ExecutionSummary::new(&run.plan, &report).to_string())?;
        if let Some(schedule) = &run.schedule {
            self.success(format!(
                "Registered schedule {} ({})",
                schedule.id, schedule.description
            ))?;
        }

        Ok(match report.outcome {
            ExecutionOutcome::Failed { .. } => ChatResult::Failed(run.plan.id),
            _ => ChatResult::Done,
        })
    }

    async fn ask(&mut self, question: &str) -> Result<bool> {
        self.renderer.prompt(question)?;
        let answer = self.read_line().await?;
        debug!("Answer to '{}': {answer:?}", question.trim());
        Ok(answer.is_some_and(|answer| {
            matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
        }))
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        self.input
            .next_line()
            .await
            .context("Failed to read from standard input")
    }

    pub async fn handle_history(&self, args: HistoryArgs) -> Result<()> {
        let filter = RecordFilter::from(args);
        let records = self
            .store()
            .query(filter)
            .await
            .context("Failed to query history")?;
        self.renderer.render(&Records(records).to_string())
    }

    pub async fn handle_schedule_command(&self, command: ScheduleCommands) -> Result<()> {
        match command {
            ScheduleCommands::Add(args) => self.add_schedule(args).await,
            ScheduleCommands::List => {
                let entries = self.store().list_schedules().await?;
                self.renderer.render(&Schedules(entries).to_string())
            }
            ScheduleCommands::Enable(args) => {
                self.store().set_schedule_enabled(args.id, true).await?;
                self.success(format!("Schedule {} enabled", args.id))
            }
            ScheduleCommands::Disable(args) => {
                self.store().set_schedule_enabled(args.id, false).await?;
                self.success(format!("Schedule {} disabled", args.id))
            }
            ScheduleCommands::Remove(args) => {
                self.store().delete_schedule(args.id).await?;
                self.success(format!("Schedule {} removed", args.id))
            }
            ScheduleCommands::RunDue(args) => {
                let auto = args.auto || self.auto_confirm;
                let runs = self
                    .agent
                    .run_due(&Zoned::now(), &self.context, auto)
                    .await
                    .context("Failed to run due schedules")?;
                info!("{} schedule(s) fired", runs.len());
                self.renderer.render(&ScheduleRuns(&runs).to_string())
            }
        }
    }

    async fn add_schedule(&self, args: AddScheduleArgs) -> Result<()> {
        let entry = NewScheduleEntry::from_intent(&args.trigger, &args.intent)?;
        let entry = self.store().register_schedule(entry).await?;
        self.renderer.render(&Schedules(vec![entry]).to_string())
    }

    pub async fn handle_rollback(&self, args: RollbackArgs) -> Result<()> {
        let backups = BackupManager::new(self.store().clone());
        let outcome = match args.target {
            RollbackTarget::Last => backups.rollback_last().await,
            RollbackTarget::Id(id) => backups.rollback_id(id).await,
        }
        .with_context(|| format!("Failed to roll back {}", args.target))?;
        self.renderer.render(&outcome.to_string())
    }

    pub async fn handle_backups(&self, args: BackupsArgs) -> Result<()> {
        let backups = BackupManager::new(self.store().clone());
        if let Some(days) = args.prune_days {
            let cutoff = Timestamp::now() - SignedDuration::from_hours(24 * i64::from(days));
            let report = backups.prune(cutoff).await.context("Failed to prune backups")?;
            self.renderer.render(&PruneResult(report).to_string())?;
        }
        let entries = backups.list().await?;
        self.renderer.render(&Backups(entries).to_string())
    }
}
