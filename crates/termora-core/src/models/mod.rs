//! Data models for plans, steps, history, backups and schedules.
//!
//! Display implementations for these models live in
//! [`crate::display::models`], keeping data structures apart from the
//! markdown presentation the CLI renders.
//!
//! # Examples
//!
//! ```rust
//! use termora_core::models::{Plan, PlanStatus, Step};
//!
//! let plan = Plan::new(
//!     "make a scratch folder and list it",
//!     vec![Step::shell("mkdir -p scratch"), Step::shell("ls scratch")],
//! );
//! assert_eq!(plan.status, PlanStatus::Pending);
//! assert_eq!(plan.steps[1].position, 1);
//! assert!(plan.validate().is_ok());
//! ```

pub mod backup;
pub mod filters;
pub mod plan;
pub mod record;
pub mod schedule;
pub mod status;
pub mod step;


pub use backup::{BackupEntry, BackupItem, Fingerprint, NodeSnapshot, RollbackOutcome};
pub use filters::RecordFilter;
pub use plan::Plan;
pub use record::{CommandRecord, NewCommandRecord, Outcome, OUTPUT_EXCERPT_CHARS};
pub use schedule::{NewScheduleEntry, ScheduleEntry, ScheduleSpec, ScheduleTemplate};
pub use status::{FailurePolicy, PlanStatus, StepKind, StepStatus};
pub use step::Step;
