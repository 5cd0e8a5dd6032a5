//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the sync engine and its hosts:
//! - Logging and tracing initialization
//! - Sync configuration and per-call option resolution
//! - Event bus for per-item progress notifications
//!
//! ## Overview
//!
//! Nothing in this crate performs a transfer. It holds the settings a
//! transfer runs under and the channel its outcome is reported on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{KindSettings, ResolvedOptions, SyncConfig, SyncConfigBuilder, SyncOptions};
pub use error::{Error, Result};
pub use events::{EventBus, EventError, EventStream, SyncEvent};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
