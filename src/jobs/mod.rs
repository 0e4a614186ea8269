// ABOUTME: Background job types and queue abstraction for asynchronous meal analysis
// ABOUTME: Defines the job payload, the queue trait, and backend selection from config
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! Background analysis jobs.
//!
//! Asynchronous analysis decouples submission from the pipeline: the enqueue
//! path loads the stored image, wraps it in an [`AnalysisJob`], and pushes it
//! onto a [`JobQueue`]. Worker tasks pop jobs and drive
//! [`MealAnalyzer::analyze_with_image`](crate::analysis::MealAnalyzer::analyze_with_image),
//! retrying with exponential backoff when the pipeline cannot reach a
//! terminal state.
//!
//! Two backends are provided:
//! - [`RedisJobQueue`] pushes to a Redis list (LPUSH) and blocks on BRPOP,
//!   for deployments where submitters and workers are separate processes
//! - [`MemoryJobQueue`] keeps jobs in-process, for single-binary deployments
//!   and tests

mod queue;
mod worker;

pub use queue::{MemoryJobQueue, RedisJobQueue};
pub use worker::WorkerPool;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};

/// Payload for one queued analysis request.
///
/// The image travels inside the job as base64 so the payload is a single
/// self-contained JSON document and workers do not need access to the media
/// store. `user_id` is carried for log correlation only; ownership was
/// already verified when the job was enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJob {
    pub user_id: Uuid,
    pub meal_id: Uuid,
    pub image_base64: String,
    pub mime: String,
}

impl AnalysisJob {
    /// Build a job from raw image bytes.
    #[must_use]
    pub fn new(user_id: Uuid, meal_id: Uuid, image: &[u8], mime: impl Into<String>) -> Self {
        Self {
            user_id,
            meal_id,
            image_base64: general_purpose::STANDARD.encode(image),
            mime: mime.into(),
        }
    }

    /// Decode the embedded image back to bytes.
    ///
    /// Returns `Bytes` so retry attempts can share the buffer without
    /// re-decoding or copying.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is not valid base64.
    pub fn image_bytes(&self) -> AppResult<Bytes> {
        let decoded = general_purpose::STANDARD
            .decode(&self.image_base64)
            .map_err(|e| AppError::invalid_format(format!("Invalid job image payload: {e}")))?;
        Ok(Bytes::from(decoded))
    }
}

/// Queue backend abstraction shared by submitters and workers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push a job onto the queue.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the push.
    async fn enqueue(&self, job: &AnalysisJob) -> AppResult<()>;

    /// Pop the next job, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `Ok(None)` when the timeout elapses with the queue still
    /// empty, so worker loops can re-check for shutdown between waits.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend read fails.
    async fn pop(&self, timeout: Duration) -> AppResult<Option<AnalysisJob>>;

    /// Short backend identifier for logs.
    fn backend_name(&self) -> &'static str;
}

/// Select a queue backend from configuration.
///
/// Redis is used whenever a Redis URL is configured; otherwise jobs stay
/// in-process, which only reaches workers in the same binary.
///
/// # Errors
///
/// Returns an error when the Redis connection cannot be established.
pub async fn queue_from_config(config: &ServerConfig) -> AppResult<Arc<dyn JobQueue>> {
    let queue: Arc<dyn JobQueue> = match &config.redis.url {
        Some(url) => Arc::new(RedisJobQueue::connect(url, &config.queue.name).await?),
        None => Arc::new(MemoryJobQueue::new()),
    };

    info!(
        "Job queue initialized: backend={} name={}",
        queue.backend_name(),
        config.queue.name
    );

    Ok(queue)
}
