#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tempfile::TempDir;
use termora_core::{
    Executor, MemoryStore, PlanProvider, PlanRequest, ProposedPlan, Store, StoreBuilder,
    TermoraError,
    context::SessionContext,
    models::{CommandRecord, NewCommandRecord, RecordFilter},
};

/// A store under `<tmp>/data` and an empty working directory `<tmp>/work`.
pub async fn create_test_store() -> (TempDir, Store, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let work = temp_dir.path().join("work");
    std::fs::create_dir(&work).expect("Failed to create work dir");
    let store = StoreBuilder::new()
        .with_data_dir(Some(temp_dir.path().join("data")))
        .build()
        .await
        .expect("Failed to create store");
    (temp_dir, store, work)
}

pub fn executor(store: &Store, work: &Path) -> Executor {
    Executor::new(
        store.clone(),
        Arc::new(store.clone()),
        SessionContext::new(work),
    )
}

/// Provider that always answers with the same proposal.
pub struct StaticProvider(pub ProposedPlan);

#[async_trait]
impl PlanProvider for StaticProvider {
    async fn propose_plan(&self, _request: &PlanRequest) -> termora_core::Result<ProposedPlan> {
        Ok(self.0.clone())
    }
}

/// Provider that answers after `delay` and remembers the last request.
pub struct SlowProvider {
    pub delay: Duration,
    pub proposal: ProposedPlan,
}

#[async_trait]
impl PlanProvider for SlowProvider {
    async fn propose_plan(&self, _request: &PlanRequest) -> termora_core::Result<ProposedPlan> {
        tokio::time::sleep(self.delay).await;
        Ok(self.proposal.clone())
    }
}

/// Provider that captures every request it sees.
#[derive(Default)]
pub struct RecordingProvider {
    pub proposal: ProposedPlan,
    pub requests: std::sync::Mutex<Vec<PlanRequest>>,
}

#[async_trait]
impl PlanProvider for RecordingProvider {
    async fn propose_plan(&self, request: &PlanRequest) -> termora_core::Result<ProposedPlan> {
        self.requests
            .lock()
            .expect("poisoned")
            .push(request.clone());
        Ok(self.proposal.clone())
    }
}

/// History backend whose appends always fail.
pub struct FailingMemory;

#[async_trait]
impl MemoryStore for FailingMemory {
    async fn append(&self, _record: NewCommandRecord) -> termora_core::Result<CommandRecord> {
        Err(TermoraError::MemoryWriteFailure {
            message: "disk full".to_string(),
        })
    }

    async fn query(&self, _filter: RecordFilter) -> termora_core::Result<Vec<CommandRecord>> {
        Ok(Vec::new())
    }
}
