//! Thread-safe allocator for uinput device ids.
//!
//! # Why do devices need ids? (for beginners)
//!
//! A harness session opens one uinput command stream and registers every
//! virtual device through it.  Each command carries an integer `id` telling
//! the uinput tool which device the command is for, so two devices on the
//! same stream must never share an id.
//!
//! The allocator uses an `AtomicU32`, so tests registering devices from
//! several threads can share one allocator without a lock.

use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out uinput device ids, starting at 1.
///
/// Id 0 is never returned; after `u32::MAX` the allocator wraps back to 1.
///
/// # Examples
///
/// ```rust
/// use uinput_core::DeviceIdAllocator;
///
/// let ids = DeviceIdAllocator::new();
/// assert_eq!(ids.next(), 1);
/// assert_eq!(ids.next(), 2);
/// ```
#[derive(Debug)]
pub struct DeviceIdAllocator {
    next: AtomicU32,
}

impl DeviceIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Returns the next id and advances the allocator.
    pub fn next(&self) -> u32 {
        // `Relaxed` is enough: ids only need to be unique, they do not order
        // any other memory accesses.
        let previous = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(if v == u32::MAX { 1 } else { v + 1 })
            });
        // The closure always returns `Some`, so both arms carry the old value.
        match previous {
            Ok(v) | Err(v) => v,
        }
    }

    /// Returns the id the next call to [`next`](Self::next) will hand out.
    pub fn peek(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for DeviceIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
