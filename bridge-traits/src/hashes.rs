//! Hash Tracker Abstraction
//!
//! The tracker remembers, per item, the local digest and remote revision
//! seen at the last successful transfer. The engine only asks it to
//! classify items and to record a transfer once it has fully succeeded.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{Item, ItemKind};
use crate::error::Result;

/// Classification of an item relative to its last recorded transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationState {
    /// Never synced.
    New,
    /// Synced, changed since.
    Modified,
    /// Tracked, but the file or remote item is gone.
    Deleted,
}

impl ModificationState {
    /// States that call for a transfer.
    pub const CHANGED: [ModificationState; 2] =
        [ModificationState::New, ModificationState::Modified];
}

impl fmt::Display for ModificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModificationState::New => "new",
            ModificationState::Modified => "modified",
            ModificationState::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

/// A tracked record as returned by [`HashTracker::list_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub id: Option<String>,
    pub name: String,
    pub path: PathBuf,
}

#[async_trait]
pub trait HashTracker: Send + Sync {
    /// Whether the local file at `path` is in one of `states`.
    async fn is_local_modified(&self, states: &[ModificationState], path: &Path) -> Result<bool>;

    /// Whether the remote copy `item` is in one of `states`.
    async fn is_remote_modified(&self, states: &[ModificationState], item: &Item) -> Result<bool>;

    /// Every record whose file lives under `base`.
    async fn list_files(&self, base: &Path) -> Result<Vec<TrackedFile>>;

    /// Record a completed transfer of `item` stored at `path`.
    async fn update_hashes(&self, path: &Path, item: &Item) -> Result<()>;

    /// Forget the records for `paths`.
    async fn remove_hashes(&self, paths: &[PathBuf]) -> Result<()>;

    /// Start time of the last complete pull of `kind`.
    async fn last_pull_timestamp(&self, kind: ItemKind) -> Result<Option<DateTime<Utc>>>;

    async fn set_last_pull_timestamp(&self, kind: ItemKind, at: DateTime<Utc>) -> Result<()>;
}
