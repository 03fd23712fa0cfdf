//! Termora CLI Application
//!
//! Command-line interface for the termora terminal agent.

mod args;
mod cli;
mod renderer;

use std::{fs::OpenOptions, path::Path, sync::Arc};

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use log::info;
use renderer::TerminalRenderer;
use termora_core::{
    Agent, AgentSettings, Config, DirectCommandProvider, PlanProvider, ProcessProvider,
    SessionContext, StoreBuilder,
};
use Commands::*;

const LOG_FILE: &str = "termora.log";

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        data_dir,
        config,
        no_color,
        command,
    } = Args::parse();

    let config = Config::load(config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config)?;

    let store = StoreBuilder::new()
        .with_data_dir(data_dir.or_else(|| config.data_dir.clone()))
        .build()
        .await
        .context("Failed to initialize data directory")?;

    let context = SessionContext::current().context("Failed to read the working directory")?;
    let agent = Agent::new(store, planner(&config, &context.directory))
        .with_settings(AgentSettings::from(&config));
    let renderer = TerminalRenderer::new(!no_color);

    info!("Termora started in {}", context.directory.display());
    let mut cli = Cli::new(agent, context, renderer, &config);

    match command {
        Some(Chat(args)) => cli.handle_chat(args).await,
        Some(History(args)) => cli.handle_history(args).await,
        Some(Schedule(args)) => cli.handle_schedule_command(args.into_command()).await,
        Some(Rollback(args)) => cli.handle_rollback(args).await,
        Some(Backups(args)) => cli.handle_backups(args).await,
        None => cli.handle_chat(args::ChatArgs::default()).await,
    }
}

/// `LOG_LEVEL` sets the filter, `RUST_LOG` still wins; with a log
/// directory, output goes to `<dir>/termora.log` instead of stderr.
fn init_logging(config: &Config) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(config.log_level_filter()?)
        .parse_default_env();

    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))
            .context("Failed to open log file")?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("Failed to initialize logging")
}

/// Direct commands run as typed; everything else goes to the configured
/// planner command, if any.
fn planner(config: &Config, cwd: &Path) -> Arc<dyn PlanProvider> {
    match &config.planner_command {
        Some(command) => {
            let inner = ProcessProvider::new(command.as_str()).with_cwd(cwd);
            Arc::new(DirectCommandProvider::with_inner(Arc::new(inner)))
        }
        None => Arc::new(DirectCommandProvider::new()),
    }
}
