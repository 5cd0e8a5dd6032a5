//! Local Store Abstraction
//!
//! The local cache for one item kind: one file per item under a base
//! directory. File layout and serialization belong to the implementation.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::content::Item;
use crate::error::Result;

/// CRUD and listing for the local copies of one item kind.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read one item by local name.
    async fn get_item(&self, name: &str) -> Result<Item>;

    /// Read every local item.
    async fn get_items(&self) -> Result<Vec<Item>>;

    /// Write an item, returning the copy as persisted.
    async fn save_item(&self, item: &Item) -> Result<Item>;

    /// Delete an item's file.
    ///
    /// Returns the removed path, or `None` when no file existed.
    async fn delete_item(&self, item: &Item) -> Result<Option<PathBuf>>;

    /// Names of every local item.
    async fn list_names(&self) -> Result<Vec<String>>;

    /// File extension used for items of this kind (without the dot).
    fn extension(&self) -> &str;

    /// Directory holding every item of this kind.
    fn base_path(&self) -> PathBuf;

    /// File path for an item.
    fn item_path(&self, item: &Item) -> PathBuf;

    /// File path for a local name.
    fn name_path(&self, name: &str) -> PathBuf;
}
