// ABOUTME: Integration tests for the full photo-to-nutrition analysis pipeline
// ABOUTME: Covers fresh analysis, cache replay, failure terminalization, and terminal-state guards
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Mealsnap Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use anyhow::Result;
use mealsnap::analysis::MealAnalyzer;
use mealsnap::database::Database;
use mealsnap::errors::ErrorCode;
use mealsnap::media::MemoryImageStore;
use mealsnap::models::{CanonicalSource, MealStatus};
use uuid::Uuid;

const IMAGE: &[u8] = b"\xff\xd8\xff\xe0 demo meal photo";

/// Database, shared memory store, and a demo-provider analyzer
async fn pipeline() -> Result<(Arc<Database>, MemoryImageStore, MealAnalyzer)> {
    let database = common::create_test_database().await?;
    let store = MemoryImageStore::new();
    let analyzer =
        common::create_demo_analyzer(Arc::clone(&database), Arc::new(store.clone())).await?;
    Ok((database, store, analyzer))
}

/// Create a pending meal attached to a freshly stored copy of `bytes`
async fn meal_with_image(
    database: &Database,
    store: &MemoryImageStore,
    user_id: Uuid,
    bytes: &[u8],
) -> Result<(Uuid, Uuid)> {
    let asset = common::store_test_image(database, store, user_id, bytes).await?;
    let meal = database.create_meal(user_id, Some(asset.id)).await?;
    Ok((meal.id, asset.id))
}

#[tokio::test]
async fn analyzing_attached_photo_produces_ready_meal_with_items() -> Result<()> {
    let (database, store, analyzer) = pipeline().await?;
    // Apple profile under the demo provider's stub label
    let canonical = common::seed_canonical(&database, "food", 52.0, 0.3, 0.2, 14.0).await?;

    let user_id = Uuid::new_v4();
    let (meal_id, asset_id) = meal_with_image(&database, &store, user_id, IMAGE).await?;

    let outcome = analyzer.analyze(meal_id, asset_id).await?;

    assert_eq!(outcome.status, MealStatus::Ready);
    assert!(!outcome.cache_hit);
    // Default rule portion is 150g (110-220); 52 kcal/100g scales to 78 (57-114)
    let summary = outcome.summary.expect("ready outcome carries a summary");
    assert_eq!(summary.kcal_mean, 78);
    assert_eq!(summary.kcal_min, 57);
    assert_eq!(summary.kcal_max, 114);
    assert_eq!(summary.confidence, 0.7);

    let meal = database.get_meal(meal_id).await?.unwrap();
    assert_eq!(meal.status, MealStatus::Ready);
    assert_eq!(meal.kcal_mean, Some(78));
    assert_eq!(meal.kcal_min, Some(57));
    assert_eq!(meal.kcal_max, Some(114));
    assert_eq!(meal.method_badge.as_deref(), Some("d2"));

    let items = database.get_meal_items(meal_id).await?;
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.label, "food");
    assert_eq!(item.grams_mean, Some(150.0));
    assert_eq!(item.grams_min, Some(110.0));
    assert_eq!(item.grams_max, Some(220.0));
    assert_eq!(item.kcal, Some(78));
    assert_eq!(item.protein, Some(0.5));
    assert_eq!(item.fat, Some(0.3));
    assert_eq!(item.carbs, Some(21.0));
    assert_eq!(item.canonical_id, Some(canonical.id));

    // Audit trail explains the derivation and is not flagged as a replay
    let entries = meal.why_json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["label"], "food");
    assert_eq!(entries[0]["cache"], false);
    assert_eq!(entries[0]["matched"]["id"], canonical.id.to_string());
    assert_eq!(entries[0]["portion"]["gramsMean"], 150.0);
    assert_eq!(entries[0]["portion"]["method"], "rule");
    assert_eq!(entries[0]["per100g"]["kcal"], 52.0);

    Ok(())
}

#[tokio::test]
async fn unknown_food_completes_with_persisted_zero_placeholder() -> Result<()> {
    let (database, store, analyzer) = pipeline().await?;

    let user_id = Uuid::new_v4();
    let (meal_id, asset_id) = meal_with_image(&database, &store, user_id, IMAGE).await?;

    // Nothing seeded: the resolver synthesizes a custom zero profile
    let outcome = analyzer.analyze(meal_id, asset_id).await?;
    assert_eq!(outcome.status, MealStatus::Ready);
    let summary = outcome.summary.unwrap();
    assert_eq!(summary.kcal_mean, 0);

    let placeholder = database
        .find_canonical_by_name("food")
        .await?
        .expect("placeholder was persisted");
    assert_eq!(placeholder.source, CanonicalSource::Custom);
    assert_eq!(placeholder.kcal_per_100g, 0.0);

    let items = database.get_meal_items(meal_id).await?;
    assert_eq!(items[0].kcal, Some(0));
    assert_eq!(items[0].canonical_id, Some(placeholder.id));

    Ok(())
}

#[tokio::test]
async fn repeat_image_replays_from_cache() -> Result<()> {
    let (database, store, analyzer) = pipeline().await?;
    common::seed_canonical(&database, "food", 52.0, 0.3, 0.2, 14.0).await?;

    let user_id = Uuid::new_v4();
    let (first_meal, first_asset) = meal_with_image(&database, &store, user_id, IMAGE).await?;
    let first = analyzer.analyze(first_meal, first_asset).await?;
    assert!(!first.cache_hit);

    // Same bytes under a different meal and even a different user
    let other_user = Uuid::new_v4();
    let (second_meal, second_asset) =
        meal_with_image(&database, &store, other_user, IMAGE).await?;
    let second = analyzer.analyze(second_meal, second_asset).await?;

    assert!(second.cache_hit);
    assert_eq!(second.status, MealStatus::Ready);
    assert_eq!(second.summary, first.summary);
    assert!(!second.items.is_empty());
    assert!(second.items.iter().all(|entry| entry.cache));

    let meal = database.get_meal(second_meal).await?.unwrap();
    assert_eq!(meal.status, MealStatus::Ready);
    assert_eq!(meal.kcal_mean, Some(78));
    let entries = meal.why_json.as_array().unwrap();
    assert_eq!(entries[0]["cache"], true);

    // Replay also materializes item rows
    let items = database.get_meal_items(second_meal).await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kcal, Some(78));

    Ok(())
}

#[tokio::test]
async fn cache_replay_recomputes_items_from_current_profile() -> Result<()> {
    let (database, store, analyzer) = pipeline().await?;
    let canonical = common::seed_canonical(&database, "food", 52.0, 0.3, 0.2, 14.0).await?;

    let user_id = Uuid::new_v4();
    let (first_meal, first_asset) = meal_with_image(&database, &store, user_id, IMAGE).await?;
    analyzer.analyze(first_meal, first_asset).await?;

    // The canonical profile changes between the analysis and its replay
    sqlx::query("UPDATE food_canonicals SET kcal_per_100g = $1 WHERE id = $2")
        .bind(104.0)
        .bind(canonical.id.to_string())
        .execute(database.pool())
        .await?;

    let (second_meal, second_asset) = meal_with_image(&database, &store, user_id, IMAGE).await?;
    let second = analyzer.analyze(second_meal, second_asset).await?;

    // Items reflect the current profile; the summary is replayed verbatim
    assert!(second.cache_hit);
    let items = database.get_meal_items(second_meal).await?;
    assert_eq!(items[0].kcal, Some(156));
    assert_eq!(second.summary.unwrap().kcal_mean, 78);

    Ok(())
}

#[tokio::test]
async fn cached_entry_for_vanished_canonical_keeps_audit_only() -> Result<()> {
    let (database, store, analyzer) = pipeline().await?;
    let canonical = common::seed_canonical(&database, "food", 52.0, 0.3, 0.2, 14.0).await?;

    let user_id = Uuid::new_v4();
    let (first_meal, first_asset) = meal_with_image(&database, &store, user_id, IMAGE).await?;
    analyzer.analyze(first_meal, first_asset).await?;

    sqlx::query("DELETE FROM food_canonicals WHERE id = $1")
        .bind(canonical.id.to_string())
        .execute(database.pool())
        .await?;

    let (second_meal, second_asset) = meal_with_image(&database, &store, user_id, IMAGE).await?;
    let second = analyzer.analyze(second_meal, second_asset).await?;

    assert!(second.cache_hit);
    assert_eq!(second.status, MealStatus::Ready);
    // The audit trail survives, the orphaned item row does not
    assert_eq!(second.items.len(), 1);
    assert!(second.items[0].cache);
    assert!(database.get_meal_items(second_meal).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn different_images_do_not_share_cache() -> Result<()> {
    let (database, store, analyzer) = pipeline().await?;
    common::seed_canonical(&database, "food", 52.0, 0.3, 0.2, 14.0).await?;

    let user_id = Uuid::new_v4();
    let (first_meal, first_asset) = meal_with_image(&database, &store, user_id, IMAGE).await?;
    analyzer.analyze(first_meal, first_asset).await?;

    let (second_meal, second_asset) =
        meal_with_image(&database, &store, user_id, b"entirely different bytes").await?;
    let second = analyzer.analyze(second_meal, second_asset).await?;

    assert!(!second.cache_hit);
    assert_eq!(second.status, MealStatus::Ready);

    Ok(())
}

#[tokio::test]
async fn photo_without_detectable_food_marks_meal_failed() -> Result<()> {
    let database = common::create_test_database().await?;
    let store = MemoryImageStore::new();
    let analyzer = common::create_scripted_analyzer(
        Arc::clone(&database),
        Arc::new(store.clone()),
        Vec::new(),
    )
    .await?;

    let user_id = Uuid::new_v4();
    let (meal_id, asset_id) = meal_with_image(&database, &store, user_id, IMAGE).await?;

    let outcome = analyzer.analyze(meal_id, asset_id).await?;
    assert_eq!(outcome.status, MealStatus::Failed);
    assert!(outcome.summary.is_none());

    let stored = database.get_meal(meal_id).await?.unwrap();
    assert_eq!(stored.status, MealStatus::Failed);
    let entries = stored.why_json.as_array().unwrap();
    assert_eq!(entries[0]["error"], "No food items detected in image");
    assert!(entries[0]["timestamp"].is_string());

    Ok(())
}

#[tokio::test]
async fn missing_asset_marks_meal_failed() -> Result<()> {
    let (database, _store, analyzer) = pipeline().await?;

    let user_id = Uuid::new_v4();
    let meal = database.create_meal(user_id, None).await?;

    let outcome = analyzer.analyze(meal.id, Uuid::new_v4()).await?;

    assert_eq!(outcome.status, MealStatus::Failed);
    assert!(outcome.summary.is_none());
    assert!(outcome.items.is_empty());

    let stored = database.get_meal(meal.id).await?.unwrap();
    assert_eq!(stored.status, MealStatus::Failed);
    let entries = stored.why_json.as_array().unwrap();
    assert_eq!(
        entries[0]["error"],
        format!("Meal {} or asset not found", meal.id)
    );

    Ok(())
}

#[tokio::test]
async fn unknown_meal_is_a_retryable_error() -> Result<()> {
    let (_database, _store, analyzer) = pipeline().await?;

    let err = analyzer
        .analyze(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);

    Ok(())
}

#[tokio::test]
async fn terminal_meal_is_not_reprocessed() -> Result<()> {
    let (database, store, analyzer) = pipeline().await?;
    common::seed_canonical(&database, "food", 52.0, 0.3, 0.2, 14.0).await?;

    let user_id = Uuid::new_v4();
    let (meal_id, asset_id) = meal_with_image(&database, &store, user_id, IMAGE).await?;
    analyzer.analyze(meal_id, asset_id).await?;

    let again = analyzer.analyze(meal_id, asset_id).await?;

    assert_eq!(again.status, MealStatus::Ready);
    // The summary is rebuilt from the persisted columns; no pipeline rerun
    assert_eq!(again.summary.unwrap().kcal_mean, 78);
    assert!(again.items.is_empty());
    assert!(!again.cache_hit);
    assert_eq!(database.get_meal_items(meal_id).await?.len(), 1);

    Ok(())
}
