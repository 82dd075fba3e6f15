//! Weighted admission gate for remote operations.
//!
//! `ConcurrencyLimiter` bounds the number of remote operations in flight to a
//! fixed capacity. Workers hold one unit each for their whole body. A phase
//! waits for its workers by acquiring the full capacity once every worker has
//! been launched, then releasing it again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::DeployError;

struct Inner {
    semaphore: Arc<Semaphore>,
    capacity: u32,
    cancel: CancellationToken,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Bounds in-flight work to a fixed capacity. Cloning shares the same gate.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

/// Units reserved from a limiter. Dropping the permit releases them.
pub struct Permit {
    _permit: OwnedSemaphorePermit,
    units: usize,
    inner: Arc<Inner>,
}

impl Permit {
    pub fn units(&self) -> usize {
        self.units
    }

    /// Give the units back now.
    pub fn release(self) {}
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(self.units, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    pub fn new(capacity: u32, cancel: CancellationToken) -> Self {
        ConcurrencyLimiter {
            inner: Arc::new(Inner {
                semaphore: Arc::new(Semaphore::new(capacity as usize)),
                capacity,
                cancel,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.inner.capacity
    }

    /// Wait until `n` units are free and reserve them.
    ///
    /// Fails with `Cancelled` if the build's cancellation token fires while
    /// waiting, and with `ConfigInvalid` if `n` exceeds the capacity.
    pub async fn acquire(&self, n: u32) -> Result<Permit, DeployError> {
        if n > self.inner.capacity {
            return Err(DeployError::ConfigInvalid(format!(
                "cannot acquire {} of {} units",
                n, self.inner.capacity
            )));
        }
        let semaphore = Arc::clone(&self.inner.semaphore);
        let permit = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => return Err(DeployError::Cancelled),
            permit = semaphore.acquire_many_owned(n) => {
                permit.map_err(|_| DeployError::Cancelled)?
            }
        };
        let units = n as usize;
        let now = self.inner.in_flight.fetch_add(units, Ordering::SeqCst) + units;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        Ok(Permit {
            _permit: permit,
            units,
            inner: Arc::clone(&self.inner),
        })
    }

    /// Wait for every outstanding unit to come back.
    ///
    /// Call only after all workers of the phase have been launched; the full
    /// capacity is acquired and immediately released.
    pub async fn barrier(&self) -> Result<(), DeployError> {
        self.acquire(self.inner.capacity).await?.release();
        Ok(())
    }

    /// Units currently reserved.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of units ever reserved at once.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn permits_are_released_on_drop() {
        let limiter = ConcurrencyLimiter::new(2, CancellationToken::new());
        let a = limiter.acquire(1).await.unwrap();
        let b = limiter.acquire(1).await.unwrap();
        assert_eq!(limiter.in_flight(), 2);
        drop(a);
        b.release();
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.peak(), 2);
    }

    #[tokio::test]
    async fn acquire_waits_for_capacity() {
        let limiter = ConcurrencyLimiter::new(1, CancellationToken::new());
        let held = limiter.acquire(1).await.unwrap();
        let waiting = tokio::time::timeout(Duration::from_millis(20), limiter.acquire(1)).await;
        assert!(waiting.is_err());
        drop(held);
        assert!(limiter.acquire(1).await.is_ok());
    }

    #[tokio::test]
    async fn oversized_request_is_rejected() {
        let limiter = ConcurrencyLimiter::new(3, CancellationToken::new());
        assert!(matches!(
            limiter.acquire(4).await,
            Err(DeployError::ConfigInvalid(_))
        ));
    }

    #[tokio::test]
    async fn cancellation_aborts_waiters() {
        let cancel = CancellationToken::new();
        let limiter = ConcurrencyLimiter::new(1, cancel.clone());
        let _held = limiter.acquire(1).await.unwrap();
        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire(1).await.map(|_| ()) })
        };
        cancel.cancel();
        assert!(matches!(waiter.await.unwrap(), Err(DeployError::Cancelled)));
    }

    #[tokio::test]
    async fn barrier_waits_for_workers() {
        let limiter = ConcurrencyLimiter::new(3, CancellationToken::new());
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let permit = limiter.acquire(1).await.unwrap();
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                done.fetch_add(1, Ordering::SeqCst);
                drop(permit);
            });
        }
        limiter.barrier().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(limiter.in_flight(), 0);
        assert!(limiter.peak() <= 3);
    }
}
