//! Backup and rollback of filesystem targets.
//!
//! Before a destructive step runs, [`BackupManager::backup`] captures each
//! target path into a [`NodeSnapshot`] manifest whose file contents go to
//! the [`BlobArena`]. After the step, [`BackupManager::record_after`] stores
//! the fingerprint of what the step left behind. A rollback only writes
//! when every target still matches either that post-step state or the
//! original state; anything else means another actor touched the path and
//! the restore stops with [`TermoraError::RestoreConflict`].

use std::path::PathBuf;

use jiff::Timestamp;
use log::{info, warn};
use tokio::task;

use crate::{
    db::{Database, RestoreTarget},
    error::{IoResultExt, Result, TermoraError},
    models::{BackupEntry, BackupItem, RollbackOutcome, Step},
    store::Store,
};

pub mod blobs;
pub mod snapshot;

pub use blobs::{ArenaUsage, BlobArena};

/// Result of [`BackupManager::prune`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub entries: usize,
    pub blobs: usize,
}

/// Takes and restores snapshots.
#[derive(Debug, Clone)]
pub struct BackupManager {
    store: Store,
    arena: BlobArena,
}

impl BackupManager {
    pub fn new(store: Store) -> Self {
        let arena = BlobArena::new(store.blob_dir());
        Self { store, arena }
    }

    pub fn arena(&self) -> &BlobArena {
        &self.arena
    }

    /// Snapshots `paths` and stores an unrestored entry for `step`.
    ///
    /// # Errors
    ///
    /// Returns `TermoraError::BackupFailed` naming the first path that could
    /// not be captured; no entry is stored in that case.
    pub async fn backup(&self, paths: Vec<PathBuf>, step: Option<&Step>) -> Result<BackupEntry> {
        let step_id = step.map(|s| s.id).filter(|id| *id != 0);
        let plan_id = step.map(|s| s.plan_id).filter(|id| *id != 0);
        let arena = self.arena.clone();
        let db_path = self.store.db_path();

        let entry = task::spawn_blocking(move || {
            let mut items = Vec::with_capacity(paths.len());
            for path in paths {
                let before = snapshot::capture(&path, Some(&arena)).map_err(|e| {
                    TermoraError::BackupFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                items.push(BackupItem {
                    before_fingerprint: snapshot::fingerprint(&before),
                    path,
                    before,
                    after_fingerprint: None,
                });
            }
            let mut db = Database::new(&db_path)?;
            db.insert_backup(step_id, plan_id, items)
        })
        .await
        .map_err(TermoraError::join)??;

        info!(
            "Backup {} captured {} path(s)",
            entry.id,
            entry.items.len()
        );
        Ok(entry)
    }

    /// Records the post-step fingerprint of each target.
    pub async fn record_after(&self, entry: &BackupEntry) -> Result<BackupEntry> {
        let mut entry = entry.clone();
        let db_path = self.store.db_path();
        task::spawn_blocking(move || {
            for item in &mut entry.items {
                item.after_fingerprint =
                    Some(snapshot::current_fingerprint(&item.path).fs_context(&item.path)?);
            }
            let mut db = Database::new(&db_path)?;
            db.update_backup_items(entry.id, &entry.items)?;
            Ok(entry)
        })
        .await
        .map_err(TermoraError::join)?
    }

    /// Restores the entry's captured state.
    pub async fn rollback(&self, entry: &BackupEntry) -> Result<RollbackOutcome> {
        self.rollback_id(entry.id).await
    }

    /// Restores the entry with `id`.
    pub async fn rollback_id(&self, id: u64) -> Result<RollbackOutcome> {
        self.restore(RestoreTarget::Id(id)).await
    }

    /// Restores the most recent unrestored entry.
    pub async fn rollback_last(&self) -> Result<RollbackOutcome> {
        self.restore(RestoreTarget::LatestUnrestored).await
    }

    /// All entries, newest first.
    pub async fn list(&self) -> Result<Vec<BackupEntry>> {
        self.store.blocking(|db| db.list_backups()).await
    }

    async fn restore(&self, target: RestoreTarget) -> Result<RollbackOutcome> {
        let arena = self.arena.clone();
        let db_path = self.store.db_path();
        let outcome = task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            db.restore_backup(target, |entry| restore_items(&arena, entry))
        })
        .await
        .map_err(TermoraError::join)??;

        match &outcome {
            RollbackOutcome::Restored { entry } => info!("Backup {} restored", entry.id),
            RollbackOutcome::AlreadyRestored { id } => info!("Backup {id} was already restored"),
        }
        Ok(outcome)
    }

    /// Deletes entries created before `cutoff` and the blobs only they
    /// referenced.
    pub async fn prune(&self, cutoff: Timestamp) -> Result<PruneReport> {
        let arena = self.arena.clone();
        self.store
            .blocking(move |db| {
                let entries = db.delete_backups_before(cutoff)?;
                let keep = db.referenced_blobs()?;
                let blobs = arena.sweep(&keep).fs_context(arena.root())?;
                Ok(PruneReport { entries, blobs })
            })
            .await
    }
}

fn restore_items(arena: &BlobArena, entry: &BackupEntry) -> Result<()> {
    // Nothing is written until every item passes both checks
    for item in &entry.items {
        if let Some(blob) = snapshot::missing_blob(&item.before, arena) {
            return Err(TermoraError::BackupMissing {
                id: entry.id,
                detail: format!("blob {blob} for '{}'", item.path.display()),
            });
        }
        check_unchanged(entry.id, item)?;
    }

    for item in &entry.items {
        snapshot::restore(&item.path, &item.before, arena).fs_context(&item.path)?;
    }
    Ok(())
}

/// The target must still hold what the step left behind, or what was there
/// before it ran. Without a recorded post-step state only the latter counts.
fn check_unchanged(id: u64, item: &BackupItem) -> Result<()> {
    let current = snapshot::current_fingerprint(&item.path).fs_context(&item.path)?;
    if current == item.before_fingerprint || item.after_fingerprint.as_ref() == Some(&current) {
        return Ok(());
    }
    warn!(
        "Backup {id}: '{}' changed since the step ran",
        item.path.display()
    );
    Err(TermoraError::RestoreConflict {
        id,
        path: item.path.clone(),
    })
}
