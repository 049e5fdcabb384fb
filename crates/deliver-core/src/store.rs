//! # Processed-Payment Store
//!
//! Records payments whose files were delivered. The in-memory store lives as
//! long as the process, so a restart forgets every delivery; a durable
//! implementation (unique key on payment id) can replace it behind the trait.
//!
//! The store does not serialize concurrent reconciliations by itself; the
//! reconciler holds a [`PaymentLocks`] guard across check, delivery and mark.

use crate::error::FulfillmentResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[async_trait]
pub trait ProcessedStore: Send + Sync {
    /// Whether delivery already succeeded for this payment
    async fn contains(&self, payment_id: &str) -> FulfillmentResult<bool>;

    /// Record a successful delivery. Returns false if it was already recorded.
    async fn mark_processed(&self, payment_id: &str) -> FulfillmentResult<bool>;
}

pub type BoxedProcessedStore = Arc<dyn ProcessedStore>;

/// Process-lifetime store; entries are never removed
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessedStore(Arc<DashMap<String, DateTime<Utc>>>);

impl InMemoryProcessedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the payment was marked, if it was
    pub fn processed_at(&self, payment_id: &str) -> Option<DateTime<Utc>> {
        self.0.get(payment_id).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[async_trait]
impl ProcessedStore for InMemoryProcessedStore {
    async fn contains(&self, payment_id: &str) -> FulfillmentResult<bool> {
        Ok(self.0.contains_key(payment_id))
    }

    async fn mark_processed(&self, payment_id: &str) -> FulfillmentResult<bool> {
        let mut inserted = false;
        self.0.entry(payment_id.to_string()).or_insert_with(|| {
            inserted = true;
            Utc::now()
        });
        Ok(inserted)
    }
}

/// One async mutex per payment id, created on demand and dropped when idle
#[derive(Debug, Default)]
pub struct PaymentLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PaymentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a payment id
    pub async fn acquire(&self, payment_id: &str) -> PaymentLockGuard<'_> {
        let lock = self
            .locks
            .entry(payment_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock_owned().await;
        PaymentLockGuard {
            locks: self,
            payment_id: payment_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of ids with a live lock (held or awaited)
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

/// Holds a payment's lock; removes the map entry on drop when nobody else waits
pub struct PaymentLockGuard<'a> {
    locks: &'a PaymentLocks,
    payment_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PaymentLockGuard<'_> {
    fn drop(&mut self) {
        // Release first so the only remaining Arc holders are the map and waiters.
        drop(self.guard.take());
        self.locks
            .locks
            .remove_if(&self.payment_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_mark_processed_once() {
        let store = InMemoryProcessedStore::new();

        assert!(!store.contains("123").await.unwrap());
        assert!(store.mark_processed("123").await.unwrap());
        assert!(!store.mark_processed("123").await.unwrap());
        assert!(store.contains("123").await.unwrap());
        assert!(store.processed_at("123").is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_locks_are_exclusive_per_id() {
        let locks = Arc::new(PaymentLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire("same").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_locks_do_not_block_other_ids() {
        let locks = PaymentLocks::new();
        let _a = locks.acquire("a").await;
        let acquired = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(acquired.is_ok());
    }
}
