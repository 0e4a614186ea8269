// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides database, cache, media store, and analyzer construction helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Mealsnap Labs
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Shared test utilities for `mealsnap`
//!
//! Common setup functions to reduce duplication across integration tests.

use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use mealsnap::{
    analysis::MealAnalyzer,
    cache::{Cache, CacheConfig},
    config::PortionMode,
    database::Database,
    media::ImageStore,
    models::{Canonical, CanonicalSource, Label, MealRecord, MediaAssetRecord},
    vision::{DemoVisionProvider, VisionRouter},
};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        // TEST_LOG controls verbosity; default keeps test output quiet
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard migrated in-memory database
pub async fn create_test_database() -> Result<Arc<Database>> {
    init_test_logging();
    let database = Database::new("sqlite::memory:").await?;
    database.migrate().await?;
    Ok(Arc::new(database))
}

/// Memory-backed cache without the background cleanup task
pub async fn create_test_cache() -> Result<Cache> {
    let cache = Cache::new(CacheConfig {
        enable_background_cleanup: false,
        ..CacheConfig::default()
    })
    .await?;
    Ok(cache)
}

/// Analyzer wired to the demo vision provider and rule-based portions
pub async fn create_demo_analyzer(
    database: Arc<Database>,
    store: Arc<dyn ImageStore>,
) -> Result<MealAnalyzer> {
    let cache = create_test_cache().await?;
    Ok(MealAnalyzer::new(
        database,
        cache,
        store,
        Arc::new(VisionRouter::Demo(DemoVisionProvider::new())),
        PortionMode::Rule,
    ))
}

/// Analyzer whose extractor returns exactly `labels` for every image
pub async fn create_scripted_analyzer(
    database: Arc<Database>,
    store: Arc<dyn ImageStore>,
    labels: Vec<Label>,
) -> Result<MealAnalyzer> {
    let cache = create_test_cache().await?;
    Ok(MealAnalyzer::new(
        database,
        cache,
        store,
        Arc::new(VisionRouter::Demo(DemoVisionProvider::with_labels(labels))),
        PortionMode::Rule,
    ))
}

/// Seed one canonical profile and return the stored row
pub async fn seed_canonical(
    database: &Database,
    name: &str,
    kcal: f64,
    protein: f64,
    fat: f64,
    carbs: f64,
) -> Result<Canonical> {
    let canonical = Canonical {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        source: CanonicalSource::Usda,
        kcal_per_100g: kcal,
        protein_per_100g: protein,
        fat_per_100g: fat,
        carbs_per_100g: carbs,
        score: None,
    };
    Ok(database.insert_canonical(&canonical).await?)
}

/// Save image bytes into the store and record the owning asset row
pub async fn store_test_image(
    database: &Database,
    store: &dyn ImageStore,
    owner_id: Uuid,
    bytes: &[u8],
) -> Result<MediaAssetRecord> {
    let asset = MediaAssetRecord {
        id: Uuid::new_v4(),
        owner_id,
        storage_key: format!("uploads/{}.jpg", Uuid::new_v4()),
        mime: "image/jpeg".to_owned(),
        size: Some(i64::try_from(bytes.len())?),
        width: None,
        height: None,
        sha256: None,
        created_at: Utc::now(),
    };
    store.save(&asset.storage_key, bytes).await?;
    database.create_asset(&asset).await?;
    Ok(asset)
}

/// Poll until the meal reaches a terminal status or the timeout elapses
pub async fn wait_for_terminal(
    database: &Database,
    meal_id: Uuid,
    timeout: Duration,
) -> Result<MealRecord> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(meal) = database.get_meal(meal_id).await? {
            if meal.status.is_terminal() {
                return Ok(meal);
            }
        }
        anyhow::ensure!(
            tokio::time::Instant::now() < deadline,
            "meal {meal_id} did not reach a terminal status within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
