// ABOUTME: Integration tests for the in-memory analysis cache backend
// ABOUTME: Covers round trips, TTL expiry, invalidation, and key hygiene
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Mealsnap Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::time::Duration;

use anyhow::Result;
use mealsnap::cache::{Cache, CacheConfig, CacheKey};
use mealsnap::models::{
    AnalysisMethod, CachedAnalysis, CanonicalRef, CanonicalSource, MealSummary, Per100g, Portion,
    PortionMethod, WhyEntry,
};
use uuid::Uuid;

fn sample_analysis() -> CachedAnalysis {
    CachedAnalysis {
        summary: MealSummary {
            kcal_mean: 78,
            kcal_min: 57,
            kcal_max: 114,
            confidence: 0.7,
            method_badge: AnalysisMethod::D2,
        },
        items: vec![WhyEntry {
            label: "apple".to_owned(),
            portion: Portion {
                grams_min: Some(110.0),
                grams_max: Some(220.0),
                grams_mean: 150.0,
                method: PortionMethod::Rule,
            },
            matched: CanonicalRef {
                id: Uuid::new_v4(),
                name: "apple".to_owned(),
                source: CanonicalSource::Usda,
                score: None,
            },
            per_100g: Per100g {
                kcal: 52.0,
                protein: 0.3,
                fat: 0.2,
                carbs: 14.0,
            },
            method: AnalysisMethod::D2,
            cache: false,
            evidence: None,
        }],
    }
}

#[tokio::test]
async fn stored_analyses_round_trip() -> Result<()> {
    let cache = common::create_test_cache().await?;
    let key = CacheKey::for_image(b"meal photo bytes");
    let analysis = sample_analysis();

    cache.set(&key, &analysis, Duration::from_secs(60)).await?;

    let loaded: CachedAnalysis = cache.get(&key).await?.expect("entry was stored");
    assert_eq!(loaded, analysis);
    assert!(cache.exists(&key).await?);
    Ok(())
}

#[tokio::test]
async fn unknown_keys_miss() -> Result<()> {
    let cache = common::create_test_cache().await?;
    let key = CacheKey::for_image(b"never stored");

    let loaded: Option<CachedAnalysis> = cache.get(&key).await?;
    assert!(loaded.is_none());
    assert!(!cache.exists(&key).await?);
    assert!(cache.ttl(&key).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn entries_expire_after_their_ttl() -> Result<()> {
    let cache = common::create_test_cache().await?;
    let key = CacheKey::for_image(b"short lived");

    cache
        .set(&key, &sample_analysis(), Duration::from_millis(40))
        .await?;
    assert!(cache.exists(&key).await?);

    tokio::time::sleep(Duration::from_millis(80)).await;

    let loaded: Option<CachedAnalysis> = cache.get(&key).await?;
    assert!(loaded.is_none());
    assert!(!cache.exists(&key).await?);
    Ok(())
}

#[tokio::test]
async fn ttl_reports_the_remaining_lifetime() -> Result<()> {
    let cache = common::create_test_cache().await?;
    let key = CacheKey::for_image(b"with ttl");

    cache
        .set(&key, &sample_analysis(), Duration::from_secs(600))
        .await?;

    let remaining = cache.ttl(&key).await?.expect("entry is live");
    assert!(remaining <= Duration::from_secs(600));
    assert!(remaining > Duration::from_secs(590));
    Ok(())
}

#[tokio::test]
async fn invalidation_removes_a_single_entry() -> Result<()> {
    let cache = common::create_test_cache().await?;
    let kept = CacheKey::for_image(b"kept");
    let dropped = CacheKey::for_image(b"dropped");

    cache
        .set(&kept, &sample_analysis(), Duration::from_secs(60))
        .await?;
    cache
        .set(&dropped, &sample_analysis(), Duration::from_secs(60))
        .await?;

    cache.invalidate(&dropped).await?;

    assert!(cache.exists(&kept).await?);
    assert!(!cache.exists(&dropped).await?);
    Ok(())
}

#[tokio::test]
async fn clear_all_empties_the_backend() -> Result<()> {
    let cache = common::create_test_cache().await?;
    for n in 0..5u8 {
        let key = CacheKey::for_image(&[n]);
        cache
            .set(&key, &sample_analysis(), Duration::from_secs(60))
            .await?;
    }

    cache.clear_all().await?;

    for n in 0..5u8 {
        assert!(!cache.exists(&CacheKey::for_image(&[n])).await?);
    }
    Ok(())
}

#[tokio::test]
async fn memory_backend_is_selected_without_a_redis_url() -> Result<()> {
    let cache = Cache::new(CacheConfig {
        enable_background_cleanup: false,
        ..CacheConfig::default()
    })
    .await?;
    assert_eq!(cache.backend_name(), "memory");
    cache.health_check().await?;
    Ok(())
}

#[tokio::test]
async fn keys_are_derived_from_image_content_only() -> Result<()> {
    let cache = common::create_test_cache().await?;
    let original = CacheKey::for_image(b"the same photo");
    let repeat = CacheKey::for_image(b"the same photo");
    let other = CacheKey::for_image(b"a different photo");

    cache
        .set(&original, &sample_analysis(), Duration::from_secs(60))
        .await?;

    // A repeat upload of identical bytes hits; different bytes miss
    assert!(cache.exists(&repeat).await?);
    assert!(!cache.exists(&other).await?);
    assert!(repeat.to_string().starts_with("img:sha256:"));
    Ok(())
}
