//! Pull queue with lease/delete semantics.
//!
//! Entries are delivered at least once: a leased entry stays invisible to
//! other consumers until its lease runs out, after which it becomes
//! leasable again unless it was deleted in the meantime.

use super::errors::AppError;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use std::{collections::BTreeMap, time::Duration};
use tokio::{sync::Mutex, time::Instant};

#[derive(Debug, Clone)]
pub struct LeasedTask {
    pub id: u64,
    pub payload: Bytes,
}

pub trait WorkQueue: Send + Sync {
    fn enqueue(&self, payloads: Vec<Bytes>) -> BoxFuture<'_, Result<(), AppError>>;

    fn lease(
        &self,
        max: usize,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Vec<LeasedTask>, AppError>>;

    fn delete(&self, ids: Vec<u64>) -> BoxFuture<'_, Result<(), AppError>>;
}

struct QueueEntry {
    payload: Bytes,
    visible_at: Instant,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    entries: BTreeMap<u64, QueueEntry>,
}

/// In-process queue. Entries survive as long as the process does.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries not yet deleted, leased or not.
    #[cfg(test)]
    pub async fn pending(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

impl WorkQueue for MemoryQueue {
    fn enqueue(&self, payloads: Vec<Bytes>) -> BoxFuture<'_, Result<(), AppError>> {
        async move {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            for payload in payloads {
                let id = state.next_id;
                state.next_id += 1;
                state.entries.insert(
                    id,
                    QueueEntry {
                        payload,
                        visible_at: now,
                    },
                );
            }
            Ok(())
        }
        .boxed()
    }

    fn lease(
        &self,
        max: usize,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Vec<LeasedTask>, AppError>> {
        async move {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let mut leased = Vec::new();

            for (id, entry) in state.entries.iter_mut() {
                if leased.len() >= max {
                    break;
                }
                if entry.visible_at <= now {
                    entry.visible_at = now + timeout;
                    leased.push(LeasedTask {
                        id: *id,
                        payload: entry.payload.clone(),
                    });
                }
            }

            Ok(leased)
        }
        .boxed()
    }

    fn delete(&self, ids: Vec<u64>) -> BoxFuture<'_, Result<(), AppError>> {
        async move {
            let mut state = self.state.lock().await;
            for id in ids {
                state.entries.remove(&id);
            }
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payloads(n: usize) -> Vec<Bytes> {
        (0..n).map(|i| Bytes::from(format!("p{}", i))).collect()
    }

    #[tokio::test]
    async fn lease_respects_max_and_hides_leased_entries() {
        let queue = MemoryQueue::new();
        queue.enqueue(payloads(5)).await.unwrap();

        let first = queue.lease(3, Duration::from_secs(60)).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].payload, Bytes::from("p0"));

        let second = queue.lease(10, Duration::from_secs(60)).await.unwrap();
        assert_eq!(second.len(), 2);

        let third = queue.lease(10, Duration::from_secs(60)).await.unwrap();
        assert!(third.is_empty());
        assert_eq!(queue.pending().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lease_is_redelivered() {
        let queue = MemoryQueue::new();
        queue.enqueue(payloads(2)).await.unwrap();

        let leased = queue.lease(10, Duration::from_secs(60)).await.unwrap();
        assert_eq!(leased.len(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;

        let again = queue.lease(10, Duration::from_secs(60)).await.unwrap();
        let ids: Vec<u64> = again.iter().map(|t| t.id).collect();
        assert_eq!(ids, leased.iter().map(|t| t.id).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_entries_never_come_back() {
        let queue = MemoryQueue::new();
        queue.enqueue(payloads(3)).await.unwrap();

        let leased = queue.lease(2, Duration::from_secs(60)).await.unwrap();
        queue
            .delete(leased.iter().map(|t| t.id).collect())
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;

        let rest = queue.lease(10, Duration::from_secs(60)).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].payload, Bytes::from("p2"));
        assert_eq!(queue.pending().await, 1);
    }
}
