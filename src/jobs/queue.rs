// ABOUTME: Redis and in-memory job queue backends for the analysis pipeline
// ABOUTME: Redis uses LPUSH/BRPOP on a list; memory uses a VecDeque with notify wakeups

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::info;

use super::{AnalysisJob, JobQueue};
use crate::errors::{AppError, AppResult};

/// Redis-backed job queue.
///
/// Jobs are JSON documents on a single list: submitters LPUSH, workers
/// BRPOP, so delivery order is FIFO and a job is handed to exactly one
/// worker. The connection carries no response timeout because BRPOP
/// legitimately waits the full pop timeout before replying.
#[derive(Clone)]
pub struct RedisJobQueue {
    manager: ConnectionManager,
    key: String,
}

impl RedisJobQueue {
    /// Connect to Redis and bind the queue to `queue_name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the client cannot be created or the initial
    /// connection fails.
    pub async fn connect(url: &str, queue_name: &str) -> AppResult<Self> {
        info!("Connecting to Redis job queue at {url} (list={queue_name})");

        let client = redis::Client::open(url)
            .map_err(|e| AppError::queue(format!("Failed to create Redis client: {e}")))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::queue(format!("Failed to connect to Redis queue: {e}")))?;

        Ok(Self {
            manager,
            key: queue_name.to_owned(),
        })
    }
}

#[async_trait::async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &AnalysisJob) -> AppResult<()> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.manager.clone();

        conn.lpush::<_, _, ()>(&self.key, payload)
            .await
            .map_err(|e| AppError::queue(format!("Queue push failed: {e}")))?;

        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> AppResult<Option<AnalysisJob>> {
        let mut conn = self.manager.clone();

        // BRPOP treats a zero timeout as "block forever"; clamp to a short wait
        let timeout_secs = timeout.as_secs_f64().max(0.01);

        let reply: Option<(String, String)> = conn
            .brpop(&self.key, timeout_secs)
            .await
            .map_err(|e| AppError::queue(format!("Queue pop failed: {e}")))?;

        match reply {
            Some((_, payload)) => {
                let job: AnalysisJob = serde_json::from_str(&payload)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// In-process job queue.
///
/// Backed by a `VecDeque` with a `Notify` so idle pops wake as soon as a
/// job arrives instead of polling. Cloning shares the same queue.
#[derive(Clone, Default)]
pub struct MemoryJobQueue {
    inner: Arc<MemoryQueueInner>,
}

#[derive(Default)]
struct MemoryQueueInner {
    jobs: Mutex<VecDeque<AnalysisJob>>,
    notify: Notify,
}

impl MemoryJobQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently waiting.
    pub async fn len(&self) -> usize {
        self.inner.jobs.lock().await.len()
    }

    /// Whether the queue is currently empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &AnalysisJob) -> AppResult<()> {
        self.inner.jobs.lock().await.push_back(job.clone());
        self.inner.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> AppResult<Option<AnalysisJob>> {
        let deadline = Instant::now() + timeout;

        loop {
            // Register for wakeup before checking, so a push that lands
            // between the check and the await is not missed
            let notified = self.inner.notify.notified();

            if let Some(job) = self.inner.jobs.lock().await.pop_front() {
                return Ok(Some(job));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            if tokio::time::timeout(remaining, notified).await.is_err() {
                // Timed out; one final check in case a push raced the timer
                return Ok(self.inner.jobs.lock().await.pop_front());
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use uuid::Uuid;

    fn job(mime: &str) -> AnalysisJob {
        AnalysisJob::new(Uuid::new_v4(), Uuid::new_v4(), b"image bytes", mime)
    }

    #[tokio::test]
    async fn memory_queue_delivers_in_fifo_order() {
        let queue = MemoryJobQueue::new();

        queue.enqueue(&job("image/jpeg")).await.unwrap();
        queue.enqueue(&job("image/png")).await.unwrap();
        assert_eq!(queue.len().await, 2);

        let first = queue.pop(Duration::from_millis(50)).await.unwrap().unwrap();
        let second = queue.pop(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(first.mime, "image/jpeg");
        assert_eq!(second.mime, "image/png");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn empty_pop_times_out_with_none() {
        let queue = MemoryJobQueue::new();

        let popped = queue.pop(Duration::from_millis(20)).await.unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn pop_wakes_when_a_job_arrives() {
        let queue = MemoryJobQueue::new();
        let producer = queue.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue(&job("image/webp")).await.unwrap();
        });

        let popped = queue.pop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(popped.unwrap().mime, "image/webp");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_the_same_queue() {
        let queue = MemoryJobQueue::new();
        let clone = queue.clone();

        queue.enqueue(&job("image/jpeg")).await.unwrap();

        let popped = clone.pop(Duration::from_millis(50)).await.unwrap();
        assert!(popped.is_some());
        assert!(queue.is_empty().await);
    }
}
