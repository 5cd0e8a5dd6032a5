//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Tokio-based file system implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        match e.kind() {
            ErrorKind::NotFound => BridgeError::NotFound(path.display().to_string()),
            _ => BridgeError::Io(e),
        }
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Self::map_io_error(path, e))?
        {
            entries.push(entry.path());
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn remove_empty_dir(&self, path: &Path) -> Result<()> {
        // `remove_dir` refuses non-empty directories on every platform.
        fs::remove_dir(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Removed empty directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn scratch_dir() -> PathBuf {
        env::temp_dir().join(format!("bridge-desktop-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_list_and_remove_empty_directory() {
        let fs_access = TokioFileSystem::new();
        let root = scratch_dir();
        let nested = root.join("layouts").join("blog");
        fs::create_dir_all(&nested).await.unwrap();

        let listed = fs_access.list_directory(&root.join("layouts")).await.unwrap();
        assert_eq!(listed, vec![nested.clone()]);

        fs_access.remove_empty_dir(&nested).await.unwrap();
        assert!(!fs_access.exists(&nested).await.unwrap());
        assert!(fs_access
            .list_directory(&root.join("layouts"))
            .await
            .unwrap()
            .is_empty());

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_refuses_non_empty_directory() {
        let fs_access = TokioFileSystem::new();
        let root = scratch_dir();
        fs::create_dir_all(&root).await.unwrap();
        fs::write(root.join("item.json"), b"{}").await.unwrap();

        assert!(fs_access.remove_empty_dir(&root).await.is_err());
        assert!(fs_access.exists(&root).await.unwrap());

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_directory_maps_to_not_found() {
        let fs_access = TokioFileSystem::new();
        let missing = scratch_dir();

        assert!(!fs_access.exists(&missing).await.unwrap());
        let err = fs_access.list_directory(&missing).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
