//! Short critical-section lock backing the packet-id allocator and the
//! async mutex's internal waiter queue. No blocking may occur
//! while held; `std::sync::Mutex` already gives us that discipline, so this
//! is a thin, explicitly-named wrapper documenting the intent.

use std::sync::{Mutex, MutexGuard};

/// A lock intended only for short, non-suspending critical sections.
pub struct Spinlock<T> {
    inner: Mutex<T>,
}

impl<T> Spinlock<T> {
    /// Wrap `value` behind the lock.
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquire the lock. Never hold the returned guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
