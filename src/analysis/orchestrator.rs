// ABOUTME: Analysis orchestrator running the image-to-nutrition state machine per meal
// ABOUTME: Handles cache replay, provider failures, and terminal status writes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{Cache, CacheKey};
use crate::compose::{self, SummaryInput, SUMMARY_CONFIDENCE};
use crate::config::PortionMode;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::media::ImageStore;
use crate::models::{
    AnalysisMethod, AnalysisOutcome, CachedAnalysis, MealRecord, MealStatus, MealSummary,
    NewMealItem, WhyEntry,
};
use crate::nutrients::NutrientResolver;
use crate::portion::PortionEstimator;
use crate::vision::{VisionProvider, VisionRouter};

/// Drives one meal photo through the full analysis pipeline.
///
/// The analyzer owns no meal state of its own; everything it derives is
/// persisted through [`Database`] and mirrored into the analysis cache keyed
/// by the image's sha256. `ready` and `failed` are terminal: a meal that
/// already reached either status is returned as-is without reprocessing.
pub struct MealAnalyzer {
    database: Arc<Database>,
    cache: Cache,
    store: Arc<dyn ImageStore>,
    vision: Arc<VisionRouter>,
    portions: PortionEstimator,
    resolver: NutrientResolver,
}

impl MealAnalyzer {
    /// Assemble the pipeline from its shared components
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        cache: Cache,
        store: Arc<dyn ImageStore>,
        vision: Arc<VisionRouter>,
        portion_mode: PortionMode,
    ) -> Self {
        let portions = PortionEstimator::new(Arc::clone(&vision), portion_mode);
        let resolver = NutrientResolver::new(Arc::clone(&database));
        Self {
            database,
            cache,
            store,
            vision,
            portions,
            resolver,
        }
    }

    /// Analyze the image asset attached to a meal.
    ///
    /// Loads the asset owner-scoped to the meal's user, then runs the
    /// pipeline. Any failure after the meal was loaded terminalizes it as
    /// `failed` and yields a failed outcome instead of an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the meal does not exist, or if writing the failed
    /// status itself fails (the meal may then still be non-terminal and the
    /// caller should retry).
    #[instrument(skip(self), fields(meal_id = %meal_id, asset_id = %asset_id))]
    pub async fn analyze(&self, meal_id: Uuid, asset_id: Uuid) -> AppResult<AnalysisOutcome> {
        let started = Instant::now();
        info!("Starting analysis for meal {meal_id}");

        let meal = self.load_meal(meal_id).await?;
        if let Some(outcome) = Self::terminal_outcome(&meal) {
            return Ok(outcome);
        }

        let outcome = match self.run_from_asset(&meal, asset_id).await {
            Ok(outcome) => outcome,
            Err(e) => self.fail_meal(meal_id, &e).await?,
        };
        Self::log_outcome(&outcome, started);
        Ok(outcome)
    }

    /// Analyze a meal from image bytes carried by a queued job.
    ///
    /// Same state machine as [`MealAnalyzer::analyze`] but without the asset
    /// load; the worker already holds the bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the meal does not exist, or if writing the failed
    /// status itself fails.
    #[instrument(skip(self, image), fields(meal_id = %meal_id, image_bytes = image.len(), mime = mime))]
    pub async fn analyze_with_image(
        &self,
        meal_id: Uuid,
        image: Bytes,
        mime: &str,
    ) -> AppResult<AnalysisOutcome> {
        let started = Instant::now();
        info!("Starting analysis for meal {meal_id}");

        let meal = self.load_meal(meal_id).await?;
        if let Some(outcome) = Self::terminal_outcome(&meal) {
            return Ok(outcome);
        }

        let outcome = match self.run_pipeline(meal_id, &image).await {
            Ok(outcome) => outcome,
            Err(e) => self.fail_meal(meal_id, &e).await?,
        };
        Self::log_outcome(&outcome, started);
        Ok(outcome)
    }

    async fn load_meal(&self, meal_id: Uuid) -> AppResult<MealRecord> {
        self.database
            .get_meal(meal_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Meal {meal_id} or asset")))
    }

    /// Outcome for a meal that already reached a terminal status; the
    /// summary is rebuilt from the persisted columns when available
    fn terminal_outcome(meal: &MealRecord) -> Option<AnalysisOutcome> {
        if !meal.status.is_terminal() {
            return None;
        }
        debug!(
            "Meal {} is already {}; skipping re-analysis",
            meal.id, meal.status
        );

        let summary = match (meal.status, meal.kcal_mean, meal.kcal_min, meal.kcal_max) {
            (MealStatus::Ready, Some(kcal_mean), Some(kcal_min), Some(kcal_max)) => {
                Some(MealSummary {
                    kcal_mean,
                    kcal_min,
                    kcal_max,
                    confidence: meal.confidence.unwrap_or(SUMMARY_CONFIDENCE),
                    method_badge: meal
                        .method_badge
                        .as_deref()
                        .map_or(AnalysisMethod::D2, AnalysisMethod::from_str_or_d2),
                })
            }
            _ => None,
        };

        Some(AnalysisOutcome {
            meal_id: meal.id,
            status: meal.status,
            summary,
            items: Vec::new(),
            cache_hit: false,
        })
    }

    async fn run_from_asset(&self, meal: &MealRecord, asset_id: Uuid) -> AppResult<AnalysisOutcome> {
        let asset = self
            .database
            .find_asset_for_owner(asset_id, meal.user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Meal {} or asset", meal.id)))?;

        let image = self.store.load(&asset.storage_key).await?;
        self.run_pipeline(meal.id, &image).await
    }

    /// The shared state machine: hash, cache check, extraction, estimation,
    /// resolution, composition, persistence, cache store
    async fn run_pipeline(&self, meal_id: Uuid, image: &[u8]) -> AppResult<AnalysisOutcome> {
        self.database.set_meal_processing(meal_id).await?;

        let key = CacheKey::for_image(image);
        if let Some(cached) = self.check_cache(&key).await {
            info!("Using cached analysis for meal {meal_id}");
            let items = self.replay_cached(meal_id, &cached).await?;
            return Ok(AnalysisOutcome {
                meal_id,
                status: MealStatus::Ready,
                summary: Some(cached.summary),
                items,
                cache_hit: true,
            });
        }

        let vision_started = Instant::now();
        let label_result = self.vision.extract_labels(image).await;
        AppLogger::log_provider_call(
            self.vision.name(),
            "extract_labels",
            label_result.is_ok(),
            Self::elapsed_ms(vision_started),
        );
        let labels = label_result?;
        debug!(
            "Extracted {} labels: {}",
            labels.len(),
            labels
                .iter()
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        if labels.is_empty() {
            return Err(AppError::no_food_detected());
        }

        let portions = self.portions.estimate(image, &labels).await;
        debug!("Estimated portions for {} items", portions.len());

        let mut why_entries = Vec::with_capacity(labels.len());
        let mut new_items = Vec::with_capacity(labels.len());
        let mut summary_inputs = Vec::with_capacity(labels.len());

        for label in &labels {
            let Some(portion) = portions.get(&label.name) else {
                warn!("No portion estimate for {}", label.name);
                continue;
            };

            let canonical = self.resolver.resolve(&label.name).await;
            let computed = compose::compute_item(portion.grams_mean, canonical.per_100g());

            summary_inputs.push(SummaryInput {
                kcal: computed.kcal,
                grams_min: portion.grams_min,
                grams_max: portion.grams_max,
                kcal_per_100g: canonical.kcal_per_100g,
            });
            new_items.push(NewMealItem {
                label: label.name.clone(),
                grams_min: portion.grams_min,
                grams_max: portion.grams_max,
                grams_mean: portion.grams_mean,
                kcal: computed.kcal,
                protein: computed.protein,
                fat: computed.fat,
                carbs: computed.carbs,
                canonical_id: Some(canonical.id),
            });
            why_entries.push(WhyEntry {
                label: label.name.clone(),
                portion: portion.clone(),
                matched: canonical.reference(),
                per_100g: canonical.per_100g(),
                method: AnalysisMethod::D2,
                cache: false,
                evidence: None,
            });
        }

        self.database.create_meal_items(meal_id, &new_items).await?;

        let summary = compose::compute_meal_summary(&summary_inputs);
        let why_json = serde_json::to_value(&why_entries)?;
        self.database
            .update_meal_ready(meal_id, &summary, &why_json)
            .await?;

        self.store_cached(
            &key,
            &CachedAnalysis {
                summary: summary.clone(),
                items: why_entries.clone(),
            },
        )
        .await;

        Ok(AnalysisOutcome {
            meal_id,
            status: MealStatus::Ready,
            summary: Some(summary),
            items: why_entries,
            cache_hit: false,
        })
    }

    /// Recreate meal items and the audit trail from a cached analysis.
    ///
    /// Each cached entry is re-resolved by canonical id so item nutrition
    /// reflects the current profile; entries whose canonical has since
    /// vanished are replayed in the audit trail without an item row. Every
    /// replayed entry is tagged `cache = true`.
    async fn replay_cached(
        &self,
        meal_id: Uuid,
        cached: &CachedAnalysis,
    ) -> AppResult<Vec<WhyEntry>> {
        let mut new_items = Vec::with_capacity(cached.items.len());
        let mut replayed = Vec::with_capacity(cached.items.len());

        for entry in &cached.items {
            if let Some(canonical) = self.database.get_canonical(entry.matched.id).await? {
                let computed =
                    compose::compute_item(entry.portion.grams_mean, canonical.per_100g());
                new_items.push(NewMealItem {
                    label: entry.label.clone(),
                    grams_min: entry.portion.grams_min,
                    grams_max: entry.portion.grams_max,
                    grams_mean: entry.portion.grams_mean,
                    kcal: computed.kcal,
                    protein: computed.protein,
                    fat: computed.fat,
                    carbs: computed.carbs,
                    canonical_id: Some(canonical.id),
                });
            } else {
                debug!(
                    "Canonical {} for cached label '{}' no longer exists; replaying without an item row",
                    entry.matched.id, entry.label
                );
            }
            replayed.push(WhyEntry {
                cache: true,
                ..entry.clone()
            });
        }

        self.database.create_meal_items(meal_id, &new_items).await?;

        let why_json = serde_json::to_value(&replayed)?;
        self.database
            .update_meal_ready(meal_id, &cached.summary, &why_json)
            .await?;

        info!("Applied cached analysis to meal {meal_id}");
        Ok(replayed)
    }

    /// Cache lookup that degrades to a miss on any backend error
    async fn check_cache(&self, key: &CacheKey) -> Option<CachedAnalysis> {
        match self.cache.get::<CachedAnalysis>(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Cache check failed for {key}: {e}");
                None
            }
        }
    }

    /// Best-effort cache write; a failure is logged and never surfaces
    async fn store_cached(&self, key: &CacheKey, value: &CachedAnalysis) {
        let ttl = self.cache.default_ttl();
        match self.cache.set(key, value, ttl).await {
            Ok(()) => debug!("Cached analysis for {key}"),
            Err(e) => warn!("Failed to cache analysis for {key}: {e}"),
        }
    }

    /// Terminalize the meal as failed with the error in its audit trail
    async fn fail_meal(&self, meal_id: Uuid, error: &AppError) -> AppResult<AnalysisOutcome> {
        error!("Analysis failed for meal {meal_id}: {error}");
        self.database
            .update_meal_failed(meal_id, &error.message)
            .await?;
        Ok(AnalysisOutcome::failed(meal_id))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn elapsed_ms(started: Instant) -> u64 {
        started.elapsed().as_millis() as u64
    }

    fn log_outcome(outcome: &AnalysisOutcome, started: Instant) {
        let duration_ms = Self::elapsed_ms(started);
        if outcome.status == MealStatus::Ready {
            info!(
                "Completed analysis for meal {} in {duration_ms}ms",
                outcome.meal_id
            );
        }
        AppLogger::log_analysis(
            &outcome.meal_id.to_string(),
            outcome.status.as_str(),
            outcome.cache_hit,
            duration_ms,
        );
    }
}
