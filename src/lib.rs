//! Workspace facade crate.
//!
//! Re-exports the engine crates so host applications can depend on
//! `content-sync-workspace` alone. The `desktop-shims` feature (on by
//! default) adds the `tokio::fs` bridge implementations.

pub use bridge_traits;
pub use core_runtime;
pub use core_sync;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
