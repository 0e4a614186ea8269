// ABOUTME: Integration tests for manual meal item portion adjustments
// ABOUTME: Covers canonical recompute, ratio fallback, clamping, guards, and the audit trail
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Mealsnap Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use anyhow::Result;
use mealsnap::analysis::adjust_meal_item;
use mealsnap::database::Database;
use mealsnap::media::MemoryImageStore;
use mealsnap::models::{AnalysisMethod, MealStatus, MealSummary, NewMealItem};
use uuid::Uuid;

const IMAGE: &[u8] = b"\xff\xd8\xff\xe0 adjustable meal";

/// Run the demo pipeline to a ready meal and return `(meal_id, item_id, user_id)`
async fn ready_meal(database: &Arc<Database>) -> Result<(Uuid, Uuid, Uuid)> {
    let store = MemoryImageStore::new();
    let analyzer =
        common::create_demo_analyzer(Arc::clone(database), Arc::new(store.clone())).await?;

    let user_id = Uuid::new_v4();
    let asset = common::store_test_image(database, &store, user_id, IMAGE).await?;
    let meal = database.create_meal(user_id, Some(asset.id)).await?;
    analyzer.analyze(meal.id, asset.id).await?;

    let items = database.get_meal_items(meal.id).await?;
    Ok((meal.id, items[0].id, user_id))
}

/// Directly persist a ready meal holding one item with no canonical link
async fn ready_meal_without_canonical(
    database: &Database,
    user_id: Uuid,
    item: NewMealItem,
) -> Result<(Uuid, Uuid)> {
    let meal = database.create_meal(user_id, None).await?;
    let item_ids = database.create_meal_items(meal.id, &[item]).await?;
    let summary = MealSummary {
        kcal_mean: 156,
        kcal_min: 140,
        kcal_max: 172,
        confidence: 0.7,
        method_badge: AnalysisMethod::D2,
    };
    database
        .update_meal_ready(meal.id, &summary, &serde_json::Value::Array(Vec::new()))
        .await?;
    Ok((meal.id, item_ids[0]))
}

fn rice_item() -> NewMealItem {
    NewMealItem {
        label: "rice".to_owned(),
        grams_min: None,
        grams_max: None,
        grams_mean: 120.0,
        kcal: 156,
        protein: 2.4,
        fat: 0.4,
        carbs: 28.0,
        canonical_id: None,
    }
}

#[tokio::test]
async fn adjustment_recomputes_from_live_canonical() -> Result<()> {
    let database = common::create_test_database().await?;
    common::seed_canonical(&database, "food", 52.0, 0.3, 0.2, 14.0).await?;
    let (meal_id, item_id, user_id) = ready_meal(&database).await?;

    // 150g (110-220) shifted by +50g, recomputed at 52 kcal/100g
    let adjusted = adjust_meal_item(&database, meal_id, item_id, 50.0, user_id)
        .await?
        .expect("ready meal items are adjustable");

    assert_eq!(adjusted.item.grams_mean, Some(200.0));
    assert_eq!(adjusted.item.grams_min, Some(160.0));
    assert_eq!(adjusted.item.grams_max, Some(270.0));
    assert_eq!(adjusted.item.kcal, Some(104));
    assert_eq!(adjusted.item.protein, Some(0.6));
    assert_eq!(adjusted.item.fat, Some(0.4));
    assert_eq!(adjusted.item.carbs, Some(28.0));

    // Summary collapses to the ±10% band around the new total
    assert_eq!(adjusted.summary.kcal_mean, 104);
    assert_eq!(adjusted.summary.kcal_min, 94);
    assert_eq!(adjusted.summary.kcal_max, 114);

    // Everything is persisted, and the meal stays ready
    let meal = database.get_meal(meal_id).await?.unwrap();
    assert_eq!(meal.status, MealStatus::Ready);
    assert_eq!(meal.kcal_mean, Some(104));
    let stored = database.get_meal_item(item_id, meal_id).await?.unwrap();
    assert_eq!(stored.grams_mean, Some(200.0));
    assert_eq!(stored.kcal, Some(104));

    Ok(())
}

#[tokio::test]
async fn adjustment_appends_to_the_audit_trail() -> Result<()> {
    let database = common::create_test_database().await?;
    common::seed_canonical(&database, "food", 52.0, 0.3, 0.2, 14.0).await?;
    let (meal_id, item_id, user_id) = ready_meal(&database).await?;

    adjust_meal_item(&database, meal_id, item_id, 50.0, user_id).await?;

    let meal = database.get_meal(meal_id).await?.unwrap();
    let entries = meal.why_json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    // The original derivation entry is preserved untouched
    assert_eq!(entries[0]["label"], "food");
    assert_eq!(entries[0]["method"], "d2");
    // The appended entry records the manual override
    assert_eq!(entries[1]["label"], "food");
    assert_eq!(entries[1]["method"], "user");
    assert_eq!(entries[1]["portion"]["gramsMean"], 200.0);
    assert_eq!(entries[1]["portion"]["method"], "user");
    assert!(entries[1]["timestamp"].is_string());

    Ok(())
}

#[tokio::test]
async fn adjustment_without_canonical_scales_by_grams_ratio() -> Result<()> {
    let database = common::create_test_database().await?;
    let user_id = Uuid::new_v4();
    let (meal_id, item_id) =
        ready_meal_without_canonical(&database, user_id, rice_item()).await?;

    let adjusted = adjust_meal_item(&database, meal_id, item_id, 60.0, user_id)
        .await?
        .unwrap();

    // 120g -> 180g is a 1.5x scale of the stored macros
    assert_eq!(adjusted.item.grams_mean, Some(180.0));
    assert_eq!(adjusted.item.grams_min, None);
    assert_eq!(adjusted.item.grams_max, None);
    assert_eq!(adjusted.item.kcal, Some(234));
    assert_eq!(adjusted.item.protein, Some(3.6));
    assert_eq!(adjusted.item.fat, Some(0.6));
    assert_eq!(adjusted.item.carbs, Some(42.0));

    assert_eq!(adjusted.summary.kcal_mean, 234);
    assert_eq!(adjusted.summary.kcal_min, 211);
    assert_eq!(adjusted.summary.kcal_max, 257);

    Ok(())
}

#[tokio::test]
async fn negative_delta_clamps_at_zero_grams() -> Result<()> {
    let database = common::create_test_database().await?;
    let user_id = Uuid::new_v4();
    let (meal_id, item_id) =
        ready_meal_without_canonical(&database, user_id, rice_item()).await?;

    let adjusted = adjust_meal_item(&database, meal_id, item_id, -500.0, user_id)
        .await?
        .unwrap();

    assert_eq!(adjusted.item.grams_mean, Some(0.0));
    assert_eq!(adjusted.item.kcal, Some(0));
    assert_eq!(adjusted.summary.kcal_mean, 0);

    Ok(())
}

#[tokio::test]
async fn non_ready_meal_is_not_adjustable() -> Result<()> {
    let database = common::create_test_database().await?;
    let user_id = Uuid::new_v4();
    let meal = database.create_meal(user_id, None).await?;
    let item_ids = database.create_meal_items(meal.id, &[rice_item()]).await?;

    // Meal is still pending
    let adjusted = adjust_meal_item(&database, meal.id, item_ids[0], 10.0, user_id).await?;
    assert!(adjusted.is_none());

    Ok(())
}

#[tokio::test]
async fn other_users_cannot_adjust_a_meal() -> Result<()> {
    let database = common::create_test_database().await?;
    let user_id = Uuid::new_v4();
    let (meal_id, item_id) =
        ready_meal_without_canonical(&database, user_id, rice_item()).await?;

    let adjusted = adjust_meal_item(&database, meal_id, item_id, 10.0, Uuid::new_v4()).await?;
    assert!(adjusted.is_none());

    // The item is untouched
    let stored = database.get_meal_item(item_id, meal_id).await?.unwrap();
    assert_eq!(stored.grams_mean, Some(120.0));

    Ok(())
}

#[tokio::test]
async fn unknown_item_yields_none() -> Result<()> {
    let database = common::create_test_database().await?;
    let user_id = Uuid::new_v4();
    let (meal_id, _item_id) =
        ready_meal_without_canonical(&database, user_id, rice_item()).await?;

    let adjusted = adjust_meal_item(&database, meal_id, Uuid::new_v4(), 10.0, user_id).await?;
    assert!(adjusted.is_none());

    Ok(())
}
