//! # Host Bridge Traits
//!
//! The data model and collaborator contracts of the content sync engine.
//!
//! ## Overview
//!
//! The engine never talks to the network or the disk directly. Each
//! collaborator is a trait that the host implements and injects:
//!
//! - [`RemoteCollection`](remote::RemoteCollection) - Paginated listing and CRUD for one remote item kind
//! - [`LocalStore`](local::LocalStore) - Local cache of one item kind
//! - [`HashTracker`](hashes::HashTracker) - Modification-state oracle and transfer records
//! - [`ManifestStore`](manifest::ManifestStore) - Named work lists of item references
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Directory pruning after local deletes
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Remote
//! implementations should:
//!
//! - Report HTTP-equivalent failures as `BridgeError::Remote` with the status
//! - Set `retry` only for transient conditions that clear on their own
//! - Report missing items as status 404
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so that one instance can be
//! shared by every concurrent transfer of a bulk operation.

pub mod content;
pub mod error;
pub mod hashes;
pub mod local;
pub mod manifest;
pub mod remote;
pub mod storage;

pub use error::BridgeError;

pub use content::{Item, ItemKind, ItemRef, ItemStatus};
pub use hashes::{HashTracker, ModificationState, TrackedFile};
pub use local::LocalStore;
pub use manifest::{ManifestEntry, ManifestSection, ManifestStore};
pub use remote::{PageRequest, RemoteCollection};
pub use storage::FileSystemAccess;
