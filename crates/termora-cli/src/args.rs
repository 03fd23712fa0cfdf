//! Command-line arguments.
//!
//! Argument structs carry clap attributes only; each converts into the core
//! type it stands for (`HistoryArgs` into a `RecordFilter`, a rollback
//! target into a backup selector) so the handlers never see clap types.
//!
//! ```text
//! User Input → CLI Args (clap) → Core types → Agent / Store
//! ```

use std::{fmt, path::PathBuf, str::FromStr};

use clap::{Args as ClapArgs, Parser, Subcommand};
use jiff::{Timestamp, civil::Date, tz::TimeZone};
use termora_core::models::RecordFilter;

/// Natural-language terminal agent
///
/// Termora turns what you ask for into a plan of shell commands, shows it,
/// runs it once you agree and remembers what it did. Destructive commands
/// are backed up first and can be rolled back.
#[derive(Parser)]
#[command(version, about, name = "termora")]
pub struct Args {
    /// Directory for the database, backups and logs. Defaults to
    /// $XDG_DATA_HOME/termora
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file. Defaults to $XDG_CONFIG_HOME/termora/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask for something in plain language
    #[command(alias = "c")]
    Chat(ChatArgs),
    /// Browse the command history
    #[command(alias = "h")]
    History(HistoryArgs),
    /// Manage recurring tasks
    #[command(alias = "s")]
    Schedule(ScheduleArgs),
    /// Restore a backup taken before a destructive step
    Rollback(RollbackArgs),
    /// List backups, optionally pruning old ones
    Backups(BackupsArgs),
}

/// Plan and run a request
///
/// With an intent, plans and runs it once. Without one, reads requests from
/// standard input line by line until `exit` or end of input.
#[derive(ClapArgs, Default)]
pub struct ChatArgs {
    /// Run without asking, including destructive steps
    #[arg(long)]
    pub auto: bool,

    /// What you want done, e.g. "find large files in my home directory"
    #[arg(trailing_var_arg = true)]
    pub intent: Vec<String>,
}

impl ChatArgs {
    pub fn intent(&self) -> Option<String> {
        let intent = self.intent.join(" ");
        (!intent.trim().is_empty()).then_some(intent)
    }
}

/// Show past commands
///
/// Most recent first, or ranked by similarity with --search.
#[derive(ClapArgs)]
pub struct HistoryArgs {
    /// Only commands run in this project
    #[arg(long)]
    pub project: Option<String>,

    /// Only commands run since this date (YYYY-MM-DD) or timestamp
    #[arg(long, value_parser = parse_since)]
    pub since: Option<Timestamp>,

    /// Rank commands by similarity to this text
    #[arg(long)]
    pub search: Option<String>,

    /// Maximum number of commands to show
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

impl From<HistoryArgs> for RecordFilter {
    fn from(val: HistoryArgs) -> Self {
        RecordFilter {
            since: val.since,
            until: None,
            project: val.project,
            text: val.search,
            limit: Some(val.limit),
        }
    }
}

fn parse_since(value: &str) -> Result<Timestamp, String> {
    if let Ok(timestamp) = value.parse::<Timestamp>() {
        return Ok(timestamp);
    }
    let date: Date = value
        .parse()
        .map_err(|_| format!("'{value}' is neither a date (YYYY-MM-DD) nor a timestamp"))?;
    date.to_zoned(TimeZone::system())
        .map(|zoned| zoned.timestamp())
        .map_err(|e| e.to_string())
}

/// Recurring tasks
///
/// `termora schedule "<trigger>" "<intent>"` is short for `schedule add`.
/// Without arguments, lists the registered schedules.
#[derive(ClapArgs)]
#[command(args_conflicts_with_subcommands = true)]
pub struct ScheduleArgs {
    #[command(subcommand)]
    pub command: Option<ScheduleCommands>,

    #[command(flatten)]
    pub add: Option<AddScheduleArgs>,
}

impl ScheduleArgs {
    pub fn into_command(self) -> ScheduleCommands {
        match (self.command, self.add) {
            (Some(command), _) => command,
            (None, Some(add)) => ScheduleCommands::Add(add),
            (None, None) => ScheduleCommands::List,
        }
    }
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Register a recurring intent
    #[command(alias = "a")]
    Add(AddScheduleArgs),
    /// List registered schedules
    #[command(aliases = ["l", "ls"])]
    List,
    /// Enable a schedule
    Enable(ScheduleIdArgs),
    /// Disable a schedule without removing it
    Disable(ScheduleIdArgs),
    /// Remove a schedule
    #[command(alias = "rm")]
    Remove(ScheduleIdArgs),
    /// Run every schedule that is due now (call this from cron or a timer)
    RunDue(RunDueArgs),
}

#[derive(ClapArgs)]
pub struct AddScheduleArgs {
    /// When to run, e.g. "every day at 09:00", "hourly", "weekdays at 7am"
    pub trigger: String,
    /// What to do each time
    pub intent: String,
}

#[derive(ClapArgs)]
pub struct ScheduleIdArgs {
    #[arg(help = "Unique identifier of the schedule")]
    pub id: u64,
}

#[derive(ClapArgs)]
pub struct RunDueArgs {
    /// Run destructive steps without waiting for confirmation
    #[arg(long)]
    pub auto: bool,
}

/// Restore a backup
///
/// `last` restores the newest backup that has not been restored yet.
#[derive(ClapArgs)]
pub struct RollbackArgs {
    #[arg(help = "`last` or the ID of a backup")]
    pub target: RollbackTarget,
}

/// Which backup to restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackTarget {
    Last,
    Id(u64),
}

impl FromStr for RollbackTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("last") {
            return Ok(RollbackTarget::Last);
        }
        s.parse()
            .map(RollbackTarget::Id)
            .map_err(|_| format!("expected `last` or a backup ID, got '{s}'"))
    }
}

impl fmt::Display for RollbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackTarget::Last => write!(f, "last"),
            RollbackTarget::Id(id) => write!(f, "{id}"),
        }
    }
}

#[derive(ClapArgs)]
pub struct BackupsArgs {
    /// Delete backups older than this many days first
    #[arg(long)]
    pub prune_days: Option<u32>,
}
