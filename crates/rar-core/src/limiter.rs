//! Concurrency limiter for classifier calls
//!
//! A counting gate shared by every record of a batch:
//! - `acquire()` suspends until a permit is free
//! - the returned `LimiterPermit` gives the permit back on drop
//! - statistics for monitoring and tests
//!
//! Because release is tied to `Drop`, a permit is returned on every exit
//! path of the holder: success, error, or the holding future being dropped
//! on cancellation. A future cancelled while still waiting in `acquire()`
//! never owned a permit.

use crate::error::LimiterError;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Limiter statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Configured maximum of simultaneous permits
    pub capacity: usize,
    /// Permits currently free
    pub available: usize,
    /// Permits handed out since creation
    pub total_acquired: u64,
    /// Highest number of permits held at the same time
    pub peak_in_flight: usize,
}

#[derive(Debug)]
struct LimiterInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    total_acquired: AtomicU64,
    peak_in_flight: AtomicUsize,
}

/// Counting admission gate
///
/// Cloning is cheap and yields a handle to the same permit pool.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<LimiterInner>,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` permits
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                total_acquired: AtomicU64::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait for a permit
    ///
    /// # Errors
    /// - `LimiterError::Closed` if the limiter was closed
    pub async fn acquire(&self) -> Result<LimiterPermit, LimiterError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| LimiterError::Closed)?;

        self.inner.total_acquired.fetch_add(1, Ordering::Relaxed);
        self.inner
            .peak_in_flight
            .fetch_max(self.in_flight(), Ordering::Relaxed);

        Ok(LimiterPermit { _permit: permit })
    }

    /// Take a permit only if one is free right now
    #[must_use]
    pub fn try_acquire(&self) -> Option<LimiterPermit> {
        let permit = Arc::clone(&self.inner.semaphore).try_acquire_owned().ok()?;
        self.inner.total_acquired.fetch_add(1, Ordering::Relaxed);
        self.inner
            .peak_in_flight
            .fetch_max(self.in_flight(), Ordering::Relaxed);
        Some(LimiterPermit { _permit: permit })
    }

    /// Configured maximum of simultaneous permits
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Permits currently free
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Permits currently held
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.capacity().saturating_sub(self.available())
    }

    /// Close the limiter; pending and future `acquire()` calls fail
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    /// Snapshot of the statistics
    #[must_use]
    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            capacity: self.capacity(),
            available: self.available(),
            total_acquired: self.inner.total_acquired.load(Ordering::Relaxed),
            peak_in_flight: self.inner.peak_in_flight.load(Ordering::Relaxed),
        }
    }
}

/// A held limiter slot; released on drop
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}
