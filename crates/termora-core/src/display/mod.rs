//! Markdown formatting for plans, history, backups and schedules.
//!
//! Domain models implement [`std::fmt::Display`] in [`models`]; collections
//! and operation outcomes get newtype or wrapper types so the same data can
//! be shown differently depending on context (a plan preview before
//! confirmation versus a failure report after execution).
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Domain Models  │    │ Collections &   │    │   Markdown      │
//! │ (Plan, Record)  │───▶│ Result Wrappers │───▶│ (termimad in    │
//! │                 │    │                 │    │  the CLI)       │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`collections`]: Records, Backups, Schedules, Plans
//! - [`results`]: execution, prune and schedule-run outcomes
//! - [`status`]: one-line success and failure messages
//! - [`datetime`]: timestamp and duration formatting
//! - [`models`]: Display implementations for domain models
//!
//! ```rust
//! use termora_core::{
//!     display::OperationStatus,
//!     models::{Plan, Step},
//! };
//!
//! let plan = Plan::new("clean up", vec![Step::shell("rm -rf build").destructive()]);
//! let preview = plan.to_string();
//! assert!(preview.contains("rm -rf build"));
//! assert!(preview.contains("destructive"));
//!
//! let status = OperationStatus::success("Schedule 3 disabled");
//! assert_eq!(status.to_string(), "Success: Schedule 3 disabled\n");
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod results;
pub mod status;

pub use collections::{Backups, Plans, Records, Schedules};
pub use datetime::{Elapsed, LocalDateTime};
pub use results::{ExecutionSummary, PruneResult, ScheduleRuns};
pub use status::OperationStatus;
