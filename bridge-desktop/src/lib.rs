//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! - `FileSystemAccess` using `tokio::fs`
//!
//! The remote collection, local store and hash tracker carry the host's
//! REST client and file formats, so hosts inject their own.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::TokioFileSystem;
//! use std::sync::Arc;
//!
//! let engine = SyncEngine::builder(ItemKind::Layouts)
//!     .file_system(Arc::new(TokioFileSystem::new()))
//!     // ...
//!     .build()?;
//! ```

mod filesystem;

pub use filesystem::TokioFileSystem;
