//! Concurrency limiters isolating one dependency from the others.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::dependency::ThreadPoolSettings;

/// Counting permit bulkhead. Callers either get a permit right away or are
/// rejected; nobody waits.
#[derive(Debug)]
pub struct SemaphoreBulkhead {
    permits: Arc<Semaphore>,
    size: u32,
}

impl SemaphoreBulkhead {
    pub fn new(size: u32) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size as usize)),
            size,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.permits.clone().try_acquire_owned().ok()
    }
}

/// How a caller got into the worker pool.
#[derive(Debug)]
pub enum Admission {
    /// A worker was free.
    Ready(OwnedSemaphorePermit),
    /// All workers busy; the caller holds a queue slot until one frees up.
    Queued(QueueSlot),
}

/// Occupies one queue position; released on drop.
#[derive(Debug)]
pub struct QueueSlot {
    queued: Arc<AtomicUsize>,
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Bounded worker pool with an optional bounded wait queue.
#[derive(Debug)]
pub struct ThreadPoolBulkhead {
    workers: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    core_size: u32,
    queue_limit: Option<usize>,
}

impl ThreadPoolBulkhead {
    pub fn new(settings: &ThreadPoolSettings) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(settings.core_size() as usize)),
            queued: Arc::new(AtomicUsize::new(0)),
            core_size: settings.core_size(),
            queue_limit: settings.effective_queue_limit(),
        }
    }

    pub fn core_size(&self) -> u32 {
        self.core_size
    }

    pub fn queue_limit(&self) -> Option<usize> {
        self.queue_limit
    }

    /// True when `settings` describe a different pool shape.
    pub fn differs_from(&self, settings: &ThreadPoolSettings) -> bool {
        self.core_size != settings.core_size() || self.queue_limit != settings.effective_queue_limit()
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Take a free worker, or a queue slot when the queue has room.
    pub fn admit(&self) -> Option<Admission> {
        if let Ok(permit) = self.workers.clone().try_acquire_owned() {
            return Some(Admission::Ready(permit));
        }

        let limit = self.queue_limit?;
        let mut prev = self.queued.load(Ordering::Relaxed);
        loop {
            if prev >= limit {
                return None;
            }
            match self.queued.compare_exchange_weak(prev, prev + 1, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(Admission::Queued(QueueSlot {
            queued: self.queued.clone(),
        }))
    }

    /// Wait for a worker. `None` only if the pool was shut down.
    pub async fn wait_for_worker(&self) -> Option<OwnedSemaphorePermit> {
        self.workers.clone().acquire_owned().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(core: u32, max_queue: i32, threshold: u32) -> ThreadPoolBulkhead {
        ThreadPoolBulkhead::new(&ThreadPoolSettings::new(core, 1, max_queue, threshold, 10_000, 10).unwrap())
    }

    #[test]
    fn test_semaphore_rejects_when_exhausted() {
        let bulkhead = SemaphoreBulkhead::new(2);
        let a = bulkhead.try_acquire().unwrap();
        let _b = bulkhead.try_acquire().unwrap();
        assert!(bulkhead.try_acquire().is_none());

        drop(a);
        assert_eq!(bulkhead.available(), 1);
        assert!(bulkhead.try_acquire().is_some());
    }

    #[test]
    fn test_no_queue_rejects_once_workers_busy() {
        let pool = pool(1, -1, 5);
        let _worker = match pool.admit() {
            Some(Admission::Ready(p)) => p,
            other => panic!("expected a worker, got {:?}", other),
        };
        assert!(pool.admit().is_none());
    }

    #[test]
    fn test_queue_bounded_by_smaller_limit() {
        let pool = pool(1, 10, 2);
        let _worker = pool.admit().unwrap();
        let first = pool.admit().unwrap();
        let _second = pool.admit().unwrap();
        assert!(matches!(first, Admission::Queued(_)));
        assert_eq!(pool.queued(), 2);
        assert!(pool.admit().is_none(), "rejection threshold reached");

        drop(first);
        assert_eq!(pool.queued(), 1);
        assert!(matches!(pool.admit(), Some(Admission::Queued(_))));
    }

    #[tokio::test]
    async fn test_queued_caller_gets_released_worker() {
        let pool = pool(1, 5, 5);
        let worker = match pool.admit() {
            Some(Admission::Ready(p)) => p,
            _ => panic!("expected a worker"),
        };
        let slot = pool.admit().unwrap();
        drop(worker);
        assert!(pool.wait_for_worker().await.is_some());
        drop(slot);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn test_differs_from_tracks_shape() {
        let settings = ThreadPoolSettings::new(4, 1, 10, 5, 10_000, 10).unwrap();
        let pool = ThreadPoolBulkhead::new(&settings);
        assert!(!pool.differs_from(&settings));
        assert!(pool.differs_from(&ThreadPoolSettings::new(4, 1, 10, 2, 10_000, 10).unwrap()));
        assert!(!pool.differs_from(&ThreadPoolSettings::new(4, 9, 10, 5, 10_000, 10).unwrap()));
    }
}
