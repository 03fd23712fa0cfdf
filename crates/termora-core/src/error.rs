//! Error types for the termora core.

use std::path::PathBuf;

use thiserror::Error;

/// Comprehensive error type for all agent operations.
///
/// The first group of variants is the agent's own failure taxonomy; the
/// second group covers infrastructure (database, file system, config).
#[derive(Error, Debug)]
pub enum TermoraError {
    /// Plan rejected by validation before anything ran
    #[error("Malformed plan: {reason}")]
    MalformedPlan { reason: String },

    /// The planning provider did not answer within the configured bound
    #[error("Planning timed out after {seconds}s")]
    PlanningTimeout { seconds: u64 },

    /// The planning provider is unavailable or returned garbage
    #[error("Planning failed: {message}")]
    PlanningFailure { message: String },

    /// Snapshot of a target path could not be taken
    #[error("Backup failed for '{path}': {reason}")]
    BackupFailed { path: PathBuf, reason: String },

    /// A step ran (or tried to run) and did not succeed
    #[error("Step {index} failed (`{payload}`): {cause}")]
    StepExecutionFailure {
        index: usize,
        payload: String,
        stderr: String,
        cause: String,
    },

    /// The snapshot blobs of a backup entry are gone
    #[error("Backup {id} is missing snapshot data: {detail}")]
    BackupMissing { id: u64, detail: String },

    /// Something other than the tracked step modified the target
    #[error("Restore conflict on '{path}': modified since backup {id} was taken")]
    RestoreConflict { id: u64, path: PathBuf },

    /// Backup entry not found for the given ID
    #[error("Backup with ID {id} not found")]
    BackupNotFound { id: u64 },

    /// No unrestored backup exists
    #[error("Nothing to roll back")]
    NothingToRollback,

    /// Command history could not be written
    #[error("Memory write failed: {message}")]
    MemoryWriteFailure { message: String },

    /// Operation not allowed in the current plan/run state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Plan not found for the given ID
    #[error("Plan with ID {id} not found")]
    PlanNotFound { id: u64 },

    /// Schedule entry not found for the given ID
    #[error("Schedule with ID {id} not found")]
    ScheduleNotFound { id: u64 },

    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },

    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),

    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A blocking task panicked or was cancelled
    #[error("Background task failed: {source}")]
    TaskJoin {
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> TermoraError {
        TermoraError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> TermoraError {
        TermoraError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl TermoraError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Shorthand for a malformed plan.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPlan {
            reason: reason.into(),
        }
    }

    /// Shorthand for an illegal state transition.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Wraps an I/O error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Join error from a blocking task.
    pub(crate) fn join(source: tokio::task::JoinError) -> Self {
        Self::TaskJoin { source }
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| TermoraError::database(message).with_source(e))
    }
}

/// Extension trait attaching a path to I/O errors.
pub trait IoResultExt<T> {
    /// Map I/O errors to [`TermoraError::FileSystem`] at `path`.
    fn fs_context(self, path: &std::path::Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| TermoraError::fs(path, e))
    }
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, TermoraError>;
