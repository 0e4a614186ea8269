// ABOUTME: Worker pool that drains the analysis queue and drives the pipeline
// ABOUTME: Retries transient failures with exponential backoff before marking meals failed

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::{AnalysisJob, JobQueue};
use crate::analysis::MealAnalyzer;
use crate::config::QueueConfig;
use crate::database::Database;
use crate::logging::AppLogger;

/// How long each idle pop waits before re-checking for shutdown
const POP_TIMEOUT: Duration = Duration::from_secs(5);

/// Base sleep after a queue pop error; jittered so workers do not retry in
/// lockstep against a struggling backend
const POP_ERROR_BACKOFF_MS: u64 = 1_000;
const POP_ERROR_JITTER_MS: u64 = 500;

/// Pool of analysis worker tasks.
///
/// Each worker loops on [`JobQueue::pop`] and runs the full pipeline for
/// every job it receives. Pipeline failures that terminalize the meal count
/// as delivered; only errors that leave the meal in limbo (meal row gone,
/// failure write itself failed) are retried, up to `max_attempts` with the
/// delay doubling per attempt. Shutdown is cooperative: workers finish the
/// job in hand before exiting.
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.worker_concurrency` workers draining `queue`.
    #[must_use]
    pub fn start(
        queue: Arc<dyn JobQueue>,
        analyzer: Arc<MealAnalyzer>,
        database: Arc<Database>,
        config: &QueueConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);

        let handles = (0..config.worker_concurrency)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: Arc::clone(&queue),
                    analyzer: Arc::clone(&analyzer),
                    database: Arc::clone(&database),
                    queue_name: config.name.clone(),
                    max_attempts: config.max_attempts.max(1),
                    backoff_initial_ms: config.backoff_initial_ms,
                };
                let rx = shutdown.subscribe();
                tokio::spawn(worker.run(rx))
            })
            .collect();

        info!(
            "Started {} analysis workers (queue={}, max_attempts={})",
            config.worker_concurrency, config.name, config.max_attempts
        );

        Self { shutdown, handles }
    }

    /// Signal all workers to stop and wait for them to finish.
    pub async fn shutdown(self) {
        info!("Stopping analysis workers");

        // Send only fails when every worker already exited
        let _ = self.shutdown.send(true);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task panicked during shutdown: {e}");
            }
        }

        info!("All analysis workers stopped");
    }
}

struct Worker {
    id: usize,
    queue: Arc<dyn JobQueue>,
    analyzer: Arc<MealAnalyzer>,
    database: Arc<Database>,
    queue_name: String,
    max_attempts: u32,
    backoff_initial_ms: u64,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Analysis worker {} started", self.id);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A closed channel means the pool was dropped; stop either way
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                popped = self.queue.pop(POP_TIMEOUT) => match popped {
                    Ok(Some(job)) => self.process_job(&job).await,
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Worker {} failed to pop from queue: {e}", self.id);
                        let jitter = rand::thread_rng().gen_range(0..POP_ERROR_JITTER_MS);
                        tokio::time::sleep(Duration::from_millis(POP_ERROR_BACKOFF_MS + jitter))
                            .await;
                    }
                }
            }
        }

        info!("Analysis worker {} stopped", self.id);
    }

    #[instrument(skip(self, job), fields(worker = self.id, meal_id = %job.meal_id, user_id = %job.user_id))]
    async fn process_job(&self, job: &AnalysisJob) {
        let meal_id = job.meal_id.to_string();
        AppLogger::log_queue_event(&self.queue_name, "dequeued", &meal_id, 1);

        let image = match job.image_bytes() {
            Ok(image) => image,
            Err(e) => {
                // An undecodable payload can never succeed; fail the meal now
                error!(
                    "Dropping job with invalid image payload for meal {}: {e}",
                    job.meal_id
                );
                self.mark_failed(job, &e.message, 1).await;
                return;
            }
        };

        let mut last_error = None;
        let mut delay_ms = self.backoff_initial_ms;

        for attempt in 1..=self.max_attempts {
            match self
                .analyzer
                .analyze_with_image(job.meal_id, image.clone(), &job.mime)
                .await
            {
                Ok(outcome) => {
                    debug!(
                        "Worker {} finished meal {} with status {} on attempt {attempt}",
                        self.id,
                        job.meal_id,
                        outcome.status.as_str()
                    );
                    return;
                }
                Err(e) => {
                    warn!(
                        "Analysis attempt {attempt}/{} failed for meal {}: {e}",
                        self.max_attempts, job.meal_id
                    );
                    last_error = Some(e);

                    if attempt < self.max_attempts {
                        AppLogger::log_queue_event(&self.queue_name, "retry", &meal_id, attempt + 1);
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = delay_ms.saturating_mul(2);
                    }
                }
            }
        }

        let message = last_error.map_or_else(|| "Analysis failed".to_owned(), |e| e.message);
        error!(
            "Exhausted {} attempts for meal {}: {message}",
            self.max_attempts, job.meal_id
        );
        self.mark_failed(job, &message, self.max_attempts).await;
    }

    /// Best-effort terminal failure write once delivery is abandoned.
    async fn mark_failed(&self, job: &AnalysisJob, message: &str, attempt: u32) {
        AppLogger::log_queue_event(&self.queue_name, "failed", &job.meal_id.to_string(), attempt);

        if let Err(e) = self.database.update_meal_failed(job.meal_id, message).await {
            error!("Failed to mark meal {} as failed: {e}", job.meal_id);
        }
    }
}
