//! Processed-message counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic count of messages whose every lane completed.
///
/// Owned explicitly and shared through an `Arc`; there is no process-global
/// instance. Reads and resets exist for test harnesses.
#[derive(Debug, Default)]
pub struct ProcessedCounter {
    count: AtomicU64,
}

impl ProcessedCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter and returns the new value.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Resets the counter to zero.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_and_reset() {
        let counter = ProcessedCounter::new();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.get(), 2);

        counter.reset();
        assert_eq!(counter.get(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let counter = Arc::new(ProcessedCounter::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    counter.increment();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.get(), 800);
    }
}
