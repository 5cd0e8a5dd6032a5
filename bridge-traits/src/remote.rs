//! Remote Collection Abstraction
//!
//! One [`RemoteCollection`] fronts the REST collection for a single item
//! kind. Transport concerns (authentication, HTTP status mapping, rate-limit
//! detection) live in the implementation; the engine only sees
//! [`BridgeError`](crate::error::BridgeError) values with a status and a
//! retry flag.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::content::Item;
use crate::error::Result;

/// Offset/limit window into a remote listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    /// Request following a page that returned `received` items.
    pub fn next(&self, received: usize) -> Self {
        Self {
            offset: self.offset + received,
            limit: self.limit,
        }
    }
}

/// Paginated listing and CRUD for one remote item kind.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Fetch one item by its remote id.
    async fn get_item(&self, id: &str) -> Result<Item>;

    /// Fetch one page of items.
    ///
    /// A page shorter than `page.limit` marks the end of the collection.
    async fn get_items(&self, page: PageRequest) -> Result<Vec<Item>>;

    /// Fetch one item by path (path-based kinds).
    async fn get_item_by_path(&self, path: &str) -> Result<Item>;

    /// Fetch one page of items modified after `since` (all items when `None`).
    async fn get_modified_items(
        &self,
        page: PageRequest,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Item>>;

    /// Create an item; the returned copy carries the assigned id and revision.
    async fn create_item(&self, item: &Item) -> Result<Item>;

    /// Update an existing item. A stale revision fails with status 409.
    async fn update_item(&self, item: &Item) -> Result<Item>;

    /// Delete an item by id. A missing item fails with status 404.
    async fn delete_item(&self, id: &str) -> Result<()>;
}
