//! Async runtime layer for the content sync engine.
//!
//! All other workspace crates depend on this crate instead of reaching for
//! tokio directly, so the runtime surface they rely on stays in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning and join handles
//! - `time`: Sleep, timeouts and instants
//! - `sync`: Synchronization primitives (Mutex, RwLock, Semaphore, channels)
//! - `throttle`: Bounded-concurrency fan-out over task factories
//!
//! # Examples
//!
//! ```rust
//! use core_async::throttle::settle_all;
//!
//! # async fn example() -> Result<(), core_async::throttle::SettleError> {
//! let tasks: Vec<_> = (0..10u32).map(|n| move || async move { n * 2 }).collect();
//! let doubled = settle_all(3, tasks).await?;
//! assert_eq!(doubled[4], 8);
//! # Ok(())
//! # }
//! ```

pub mod sync;
pub mod task;
pub mod throttle;
pub mod time;

pub use task::spawn;
pub use throttle::{settle_all, settle_chunked, SettleError};
pub use time::{sleep, Duration, Instant};
