//! Backup entries and filesystem snapshot manifests.

use std::{collections::BTreeMap, path::PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Hex-encoded SHA-256 digest.
pub type Fingerprint = String;

/// Captured state of one filesystem node.
///
/// File contents live in the blob arena, addressed by `blob`; a manifest is
/// therefore small and directories are captured structurally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeSnapshot {
    /// Target did not exist yet (tombstone)
    Missing,
    File {
        blob: Fingerprint,
        size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<u32>,
    },
    Symlink {
        target: PathBuf,
    },
    Dir {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<u32>,
        /// Children keyed by file name
        entries: BTreeMap<String, NodeSnapshot>,
    },
}

impl NodeSnapshot {
    /// Blob fingerprints referenced by this node and its children.
    pub fn blobs(&self) -> Vec<&Fingerprint> {
        let mut out = Vec::new();
        self.collect_blobs(&mut out);
        out
    }

    fn collect_blobs<'a>(&'a self, out: &mut Vec<&'a Fingerprint>) {
        match self {
            NodeSnapshot::File { blob, .. } => out.push(blob),
            NodeSnapshot::Dir { entries, .. } => {
                for child in entries.values() {
                    child.collect_blobs(out);
                }
            }
            NodeSnapshot::Missing | NodeSnapshot::Symlink { .. } => {}
        }
    }

    /// Number of regular files in the node.
    pub fn file_count(&self) -> usize {
        self.blobs().len()
    }
}

/// One target path of a backup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupItem {
    /// Absolute target path
    pub path: PathBuf,
    /// Pre-step snapshot
    pub before: NodeSnapshot,
    /// Fingerprint of `before`
    pub before_fingerprint: Fingerprint,
    /// Fingerprint of the state the tracked step left behind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_fingerprint: Option<Fingerprint>,
}

/// Snapshot taken before a destructive step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupEntry {
    pub id: u64,
    /// Step the backup protects
    pub step_id: Option<u64>,
    pub plan_id: Option<u64>,
    pub items: Vec<BackupItem>,
    pub created_at: Timestamp,
    /// Flips `false -> true` exactly once
    pub restored: bool,
    pub restored_at: Option<Timestamp>,
}

impl BackupEntry {
    /// Target paths covered by the entry.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.items.iter().map(|item| &item.path)
    }
}

/// Result of a rollback request.
#[derive(Debug, Clone, PartialEq)]
pub enum RollbackOutcome {
    /// Captured state was written back
    Restored { entry: BackupEntry },
    /// The entry had been restored before; nothing was touched
    AlreadyRestored { id: u64 },
}

impl RollbackOutcome {
    /// ID of the entry the outcome is about.
    pub fn entry_id(&self) -> u64 {
        match self {
            RollbackOutcome::Restored { entry } => entry.id,
            RollbackOutcome::AlreadyRestored { id } => *id,
        }
    }
}
