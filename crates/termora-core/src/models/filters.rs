//! Filter types for querying command history.

use jiff::Timestamp;

/// Filter options for history queries.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Only records at or after this instant
    pub since: Option<Timestamp>,

    /// Only records at or before this instant
    pub until: Option<Timestamp>,

    /// Project tag (exact match on the detected project name)
    pub project: Option<String>,

    /// Free text; records are ranked by similarity of their intent and
    /// payload instead of pure recency
    pub text: Option<String>,

    /// Maximum number of records
    pub limit: Option<usize>,
}

impl RecordFilter {
    /// The `n` most recent records.
    pub fn recent(n: usize) -> Self {
        Self {
            limit: Some(n),
            ..Default::default()
        }
    }

    /// Records similar to `text`, best first.
    ///
    /// ```rust
    /// use termora_core::models::RecordFilter;
    ///
    /// let filter = RecordFilter::similar_to("compress logs", 5);
    /// assert_eq!(filter.text.as_deref(), Some("compress logs"));
    /// assert_eq!(filter.limit, Some(5));
    /// ```
    pub fn similar_to(text: impl Into<String>, n: usize) -> Self {
        Self {
            text: Some(text.into()),
            limit: Some(n),
            ..Default::default()
        }
    }

    /// Restricts the filter to a project.
    pub fn in_project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }
}
