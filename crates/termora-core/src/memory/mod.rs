//! Durable command history.
//!
//! Every executed step becomes one append-only [`CommandRecord`]. The
//! orchestrator reads the history back to enrich planning requests with
//! similar past commands, and the CLI browses it.

use async_trait::async_trait;

use crate::{
    error::{Result, TermoraError},
    models::{CommandRecord, NewCommandRecord, RecordFilter},
    store::Store,
};

pub mod similarity;

/// Records considered when ranking by similarity.
const SIMILARITY_WINDOW: usize = 500;

/// Append-only history of executed steps.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Appends one record. Failures surface as
    /// [`TermoraError::MemoryWriteFailure`].
    async fn append(&self, record: NewCommandRecord) -> Result<CommandRecord>;

    /// Records matching `filter`, most relevant first.
    ///
    /// Without `filter.text` the order is most recent first; with it,
    /// records are ranked by [`similarity::score`].
    async fn query(&self, filter: RecordFilter) -> Result<Vec<CommandRecord>>;
}

#[async_trait]
impl MemoryStore for Store {
    async fn append(&self, record: NewCommandRecord) -> Result<CommandRecord> {
        self.blocking(move |db| db.append_record(&record))
            .await
            .map_err(|e| TermoraError::MemoryWriteFailure {
                message: e.to_string(),
            })
    }

    async fn query(&self, filter: RecordFilter) -> Result<Vec<CommandRecord>> {
        self.blocking(move |db| match filter.text.clone() {
            Some(text) => {
                let limit = filter.limit.unwrap_or(usize::MAX);
                let window = RecordFilter {
                    limit: Some(SIMILARITY_WINDOW),
                    text: None,
                    ..filter
                };
                let candidates = db.history(&window).collect::<Result<Vec<_>>>()?;
                Ok(similarity::rank(&text, candidates, limit))
            }
            None => db.history(&filter).collect(),
        })
        .await
    }
}
