//! Core library for the Termora terminal agent.
//!
//! Termora turns a natural-language intent into a plan of shell commands,
//! scripts and schedule registrations, asks for confirmation, executes the
//! plan step by step and remembers what it did. Destructive steps are
//! snapshotted first so they can be rolled back.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────┐  PlanRequest   ┌──────────────┐
//! intent ───▶│ orchestrator │───────────────▶│   planning   │
//!            │    Agent     │◀───────────────│ PlanProvider │
//!            └──────┬───────┘  ProposedPlan  └──────────────┘
//!                   │ confirmed Plan
//!                   ▼
//!            ┌──────────────┐ snapshot/restore ┌──────────────┐
//!            │   executor   │─────────────────▶│    backup    │
//!            └──────┬───────┘                  └──────────────┘
//!                   │ CommandRecord / ScheduleEntry
//!                   ▼
//!            ┌──────────────┐
//!            │ store (SQLite│  memory::MemoryStore, scheduler
//!            │  + blobs)    │
//!            └──────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use termora_core::{
//!     StoreBuilder,
//!     context::SessionContext,
//!     models::{Plan, Step},
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StoreBuilder::new()
//!     .with_data_dir(Some("/tmp/termora-example"))
//!     .build()
//!     .await?;
//!
//! let plan = store
//!     .save_plan(Plan::new("say hello", vec![Step::shell("echo hello")]))
//!     .await?;
//! println!("{plan}");
//!
//! let context = SessionContext::current()?;
//! # let _ = context;
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod context;
pub mod db;
pub mod display;
pub mod error;
pub mod executor;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod planning;
pub mod scheduler;
pub mod store;

// Re-export commonly used types
pub use backup::{BackupManager, PruneReport};
pub use config::Config;
pub use context::SessionContext;
pub use db::Database;
pub use error::{Result, TermoraError};
pub use executor::{ExecutionOutcome, ExecutionReport, Executor};
pub use memory::MemoryStore;
pub use models::{
    BackupEntry, CommandRecord, Plan, PlanStatus, RecordFilter, RollbackOutcome, ScheduleEntry,
    Step, StepKind, StepStatus,
};
pub use orchestrator::{Agent, AgentRun, AgentSettings, RequestState};
pub use planning::{DirectCommandProvider, PlanProvider, PlanRequest, ProcessProvider, ProposedPlan};
pub use scheduler::ScheduleRegistry;
pub use store::{Store, StoreBuilder};
