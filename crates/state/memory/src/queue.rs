use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use voxguard_state::error::StateError;
use voxguard_state::queue::JobQueue;

/// In-process FIFO queue of job ids.
///
/// `pop_blocking` parks on a [`Notify`] until an item arrives or the timeout
/// elapses. FIFO order holds across any interleaving of pushes and pops.
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl MemoryJobQueue {
    /// Create a new, empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids currently waiting.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Whether the queue is currently empty.
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn push(&self, job_id: &str) -> Result<(), StateError> {
        self.items.lock().await.push_back(job_id.to_owned());
        self.notify.notify_one();
        Ok(())
    }

    async fn pop_blocking(&self, timeout: Duration) -> Result<Option<String>, StateError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(id) = self.items.lock().await.pop_front() {
                return Ok(Some(id));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // A push between the pop attempt and this await stores a permit
            // in the Notify, so the wakeup cannot be lost.
            if tokio::time::timeout(deadline - now, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn fifo_order_preserved() {
        let queue = MemoryJobQueue::new();
        for id in ["a", "b", "c"] {
            queue.push(id).await.unwrap();
        }

        assert_eq!(
            queue.pop_blocking(Duration::from_millis(10)).await.unwrap(),
            Some("a".to_owned())
        );
        assert_eq!(
            queue.pop_blocking(Duration::from_millis(10)).await.unwrap(),
            Some("b".to_owned())
        );

        // Intermixed push keeps going to the tail.
        queue.push("d").await.unwrap();
        assert_eq!(
            queue.pop_blocking(Duration::from_millis(10)).await.unwrap(),
            Some("c".to_owned())
        );
        assert_eq!(
            queue.pop_blocking(Duration::from_millis(10)).await.unwrap(),
            Some("d".to_owned())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pop_times_out_on_empty_queue() {
        let queue = MemoryJobQueue::new();
        let popped = queue.pop_blocking(Duration::from_secs(2)).await.unwrap();
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let queue = Arc::new(MemoryJobQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop_blocking(Duration::from_secs(5)).await })
        };

        // Give the consumer a chance to park first.
        tokio::task::yield_now().await;
        queue.push("job_wake").await.unwrap();

        let popped = consumer.await.unwrap().unwrap();
        assert_eq!(popped, Some("job_wake".to_owned()));
    }

    #[tokio::test]
    async fn each_id_delivered_to_exactly_one_consumer() {
        let queue = Arc::new(MemoryJobQueue::new());
        for i in 0..10 {
            queue.push(&format!("job_{i}")).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(id) = queue
                    .pop_blocking(Duration::from_millis(50))
                    .await
                    .unwrap()
                {
                    seen.push(id);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        let expected: Vec<String> = (0..10).map(|i| format!("job_{i}")).collect();
        assert_eq!(all, expected, "no id lost, none delivered twice");
    }
}
