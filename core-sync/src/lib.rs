//! # Sync Module
//!
//! Reconciles remote content collections with their local file cache.
//!
//! ## Overview
//!
//! One [`SyncEngine`] per item kind moves items between a
//! `RemoteCollection` and a `LocalStore`, recording each transfer with a
//! `HashTracker` and reporting progress on an optional event bus carried by
//! the [`SyncContext`].
//!
//! ## Components
//!
//! - **Reconciliation Engine** (`engine`): single-item pull, push, create and
//!   delete, including 409 conflict analysis
//! - **Bulk Operation Driver** (`bulk`): paginated pulls, bulk pushes and
//!   deletes, change listings
//! - **Manifest Entry Points** (`manifest`): bulk operations restricted to a
//!   named manifest
//! - **Retry Coordinator** (`retry`): pass-based retry of retryable failures
//! - **Conflict Analysis** (`conflict`): payload comparison ignoring
//!   server-maintained fields
//! - **Name Validation** (`names`): local file name checks
//!
//! ## Usage
//!
//! ```ignore
//! use core_sync::{SyncContext, SyncEngine};
//! use core_runtime::config::SyncOptions;
//!
//! let engine = SyncEngine::builder(ItemKind::Categories)
//!     .remote(remote)
//!     .local(store)
//!     .hashes(tracker)
//!     .build()?;
//!
//! let ctx = SyncContext::with_events(bus.clone());
//! let pulled = engine.pull_all_items(&ctx, &SyncOptions::default()).await?;
//! ```

pub mod bulk;
pub mod conflict;
pub mod context;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod names;
pub mod retry;

pub use conflict::{differing_fields, is_trivial_conflict, VOLATILE_FIELDS};
pub use context::SyncContext;
pub use engine::{ItemPolicy, SyncEngine, SyncEngineBuilder};
pub use error::{Result, SyncError};
pub use names::validate_item_name;
pub use retry::{Attempt, RetryCoordinator, RetryQueue, RetryReport};
