//! File System Abstraction
//!
//! Directory operations the engine needs after deleting local items.
//! Reading and writing item files is the job of
//! [`LocalStore`](crate::local::LocalStore).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// File system access trait
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn prune(fs: &dyn FileSystemAccess, dir: &Path) -> Result<()> {
///     if fs.list_directory(dir).await?.is_empty() {
///         fs.remove_empty_dir(dir).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Remove a directory that has no entries
    ///
    /// Fails if the directory is not empty.
    async fn remove_empty_dir(&self, path: &Path) -> Result<()>;
}
