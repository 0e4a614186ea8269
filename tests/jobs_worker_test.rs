// ABOUTME: Integration tests for the analysis job queue and worker pool
// ABOUTME: Covers queue draining, sync/async dispatch, bad jobs, and shutdown
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Mealsnap Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mealsnap::analysis::lifecycle::{dispatch_analysis, enqueue_analysis, AnalysisStart};
use mealsnap::analysis::MealAnalyzer;
use mealsnap::config::{AnalyzeMode, QueueConfig};
use mealsnap::database::Database;
use mealsnap::jobs::{AnalysisJob, JobQueue, MemoryJobQueue, WorkerPool};
use mealsnap::media::MemoryImageStore;
use mealsnap::models::MealStatus;
use uuid::Uuid;

const IMAGE: &[u8] = b"\xff\xd8\xff\xe0 queued meal photo";

fn test_queue_config() -> QueueConfig {
    QueueConfig {
        name: "food-analyze".to_owned(),
        worker_concurrency: 2,
        max_attempts: 2,
        backoff_initial_ms: 10,
    }
}

struct Ctx {
    database: Arc<Database>,
    store: MemoryImageStore,
    analyzer: Arc<MealAnalyzer>,
    queue: Arc<MemoryJobQueue>,
}

async fn setup() -> Result<Ctx> {
    common::init_test_logging();
    let database = common::create_test_database().await?;
    common::seed_canonical(&database, "food", 52.0, 0.3, 0.2, 14.0).await?;
    let store = MemoryImageStore::new();
    let analyzer = Arc::new(
        common::create_demo_analyzer(Arc::clone(&database), Arc::new(store.clone())).await?,
    );
    Ok(Ctx {
        database,
        store,
        analyzer,
        queue: Arc::new(MemoryJobQueue::new()),
    })
}

#[tokio::test]
async fn workers_drain_queued_jobs_to_ready_meals() -> Result<()> {
    let ctx = setup().await?;
    let pool = WorkerPool::start(
        ctx.queue.clone(),
        Arc::clone(&ctx.analyzer),
        Arc::clone(&ctx.database),
        &test_queue_config(),
    );

    let user_id = Uuid::new_v4();
    let asset = common::store_test_image(&ctx.database, &ctx.store, user_id, IMAGE).await?;
    let meal = ctx.database.create_meal(user_id, Some(asset.id)).await?;
    enqueue_analysis(&ctx.database, &ctx.store, ctx.queue.as_ref(), meal.id).await?;

    let done = common::wait_for_terminal(&ctx.database, meal.id, Duration::from_secs(5)).await?;
    assert_eq!(done.status, MealStatus::Ready);
    assert_eq!(done.kcal_mean, Some(78));
    let items = ctx.database.get_meal_items(meal.id).await?;
    assert_eq!(items.len(), 1);
    assert!(ctx.queue.is_empty().await);

    pool.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn async_dispatch_queues_the_job_instead_of_running_it() -> Result<()> {
    let ctx = setup().await?;
    let user_id = Uuid::new_v4();
    let asset = common::store_test_image(&ctx.database, &ctx.store, user_id, IMAGE).await?;
    let meal = ctx.database.create_meal(user_id, Some(asset.id)).await?;

    let start = dispatch_analysis(
        &ctx.database,
        &ctx.store,
        ctx.queue.as_ref(),
        &ctx.analyzer,
        AnalyzeMode::Async,
        meal.id,
    )
    .await?;

    match start {
        AnalysisStart::Queued { meal_id } => assert_eq!(meal_id, meal.id),
        AnalysisStart::Completed(outcome) => panic!("expected a queued job, got {outcome:?}"),
    }
    assert_eq!(ctx.queue.len().await, 1);

    // The meal has not been touched yet
    let stored = ctx.database.get_meal(meal.id).await?.unwrap();
    assert_eq!(stored.status, MealStatus::Pending);

    // The job is self-contained: image bytes travel with it
    let job = ctx
        .queue
        .pop(Duration::from_millis(100))
        .await?
        .expect("job was queued");
    assert_eq!(job.meal_id, meal.id);
    assert_eq!(job.user_id, user_id);
    assert_eq!(job.mime, "image/jpeg");
    assert_eq!(job.image_bytes()?.as_ref(), IMAGE);

    Ok(())
}

#[tokio::test]
async fn sync_dispatch_runs_the_pipeline_inline() -> Result<()> {
    let ctx = setup().await?;
    let user_id = Uuid::new_v4();
    let asset = common::store_test_image(&ctx.database, &ctx.store, user_id, IMAGE).await?;
    let meal = ctx.database.create_meal(user_id, Some(asset.id)).await?;

    let start = dispatch_analysis(
        &ctx.database,
        &ctx.store,
        ctx.queue.as_ref(),
        &ctx.analyzer,
        AnalyzeMode::Sync,
        meal.id,
    )
    .await?;

    let AnalysisStart::Completed(outcome) = start else {
        panic!("expected an inline run");
    };
    assert_eq!(outcome.status, MealStatus::Ready);
    assert_eq!(outcome.summary.as_ref().unwrap().kcal_mean, 78);
    assert!(ctx.queue.is_empty().await);

    Ok(())
}

#[tokio::test]
async fn job_for_a_vanished_meal_does_not_wedge_the_pool() -> Result<()> {
    let ctx = setup().await?;
    let pool = WorkerPool::start(
        ctx.queue.clone(),
        Arc::clone(&ctx.analyzer),
        Arc::clone(&ctx.database),
        &test_queue_config(),
    );

    // A job whose meal row never existed exhausts its attempts and is dropped
    let orphan = AnalysisJob::new(Uuid::new_v4(), Uuid::new_v4(), IMAGE, "image/jpeg");
    ctx.queue.enqueue(&orphan).await?;

    // A healthy job queued behind it still completes
    let user_id = Uuid::new_v4();
    let asset = common::store_test_image(&ctx.database, &ctx.store, user_id, IMAGE).await?;
    let meal = ctx.database.create_meal(user_id, Some(asset.id)).await?;
    enqueue_analysis(&ctx.database, &ctx.store, ctx.queue.as_ref(), meal.id).await?;

    let done = common::wait_for_terminal(&ctx.database, meal.id, Duration::from_secs(5)).await?;
    assert_eq!(done.status, MealStatus::Ready);

    pool.shutdown().await;
    assert!(ctx.queue.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn idle_pool_shuts_down_promptly() -> Result<()> {
    let ctx = setup().await?;
    let pool = WorkerPool::start(
        ctx.queue.clone(),
        Arc::clone(&ctx.analyzer),
        Arc::clone(&ctx.database),
        &test_queue_config(),
    );

    // Workers parked on an empty queue must notice the signal, not finish
    // their pop timeout first
    tokio::time::timeout(Duration::from_secs(2), pool.shutdown()).await?;
    Ok(())
}
