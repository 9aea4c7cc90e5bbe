//! Concurrency primitives internal to the session layer.

pub mod async_mutex;
pub mod spinlock;

pub use async_mutex::{AsyncMutex, AsyncMutexGuard};
pub use spinlock::Spinlock;
