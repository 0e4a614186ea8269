// ABOUTME: Pure nutrition arithmetic for per-item macros and meal summaries
// ABOUTME: No I/O; deterministic rounding shared by the pipeline and manual adjustments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! # Nutrition Composer
//!
//! Deterministic arithmetic turning `(grams, per-100g profile)` pairs into
//! per-item nutrition and meal-level summaries. Everything here is pure so it
//! can be unit-tested without a database or provider.
//!
//! Rounding contract (fixed, collaborator clients depend on it):
//! - kcal rounds to the nearest integer
//! - protein/fat/carbs round to one decimal place
//! - summary bounds round to the nearest integer

use crate::models::{AnalysisMethod, ComputedItem, MealSummary, Per100g};

/// Fixed confidence reported on every image-derived meal summary
pub const SUMMARY_CONFIDENCE: f64 = 0.7;

/// Input row for [`compute_meal_summary`]: one computed item plus the portion
/// bounds and profile needed to derive its kcal bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryInput {
    /// Mean kilocalories already computed for the item
    pub kcal: i64,
    /// Portion lower bound in grams, when the estimator supplied one
    pub grams_min: Option<f64>,
    /// Portion upper bound in grams, when the estimator supplied one
    pub grams_max: Option<f64>,
    /// Kilocalories per 100g of the matched canonical
    pub kcal_per_100g: f64,
}

/// Round a kcal value to the nearest integer
#[allow(clippy::cast_possible_truncation)]
#[must_use]
fn round_kcal(value: f64) -> i64 {
    value.round() as i64
}

/// Round a macro value to one decimal place
#[must_use]
fn round_macro(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute the nutrition of one item at the given grams.
///
/// `multiplier = grams / 100`; kcal is rounded to an integer, macros to one
/// decimal place.
#[must_use]
pub fn compute_item(grams: f64, per_100g: Per100g) -> ComputedItem {
    let multiplier = grams / 100.0;
    ComputedItem {
        kcal: round_kcal(per_100g.kcal * multiplier),
        protein: round_macro(per_100g.protein * multiplier),
        fat: round_macro(per_100g.fat * multiplier),
        carbs: round_macro(per_100g.carbs * multiplier),
    }
}

/// Aggregate per-item results into a meal summary.
///
/// `kcal_mean` is the sum of the per-item mean kcal. `kcal_min` and
/// `kcal_max` sum the per-item kcal at the portion bounds for items that
/// carry them; when a bound sum ends up exactly zero (no item carried that
/// bound, or every bounded item had a zero profile) it falls back to
/// `kcal_mean * 0.9` / `* 1.1` rounded. The fallback is summary-wide: a
/// single bounded item suppresses it for the whole meal.
#[must_use]
pub fn compute_meal_summary(items: &[SummaryInput]) -> MealSummary {
    let mut kcal_mean = 0_i64;
    let mut kcal_min = 0_i64;
    let mut kcal_max = 0_i64;

    for item in items {
        kcal_mean += item.kcal;
        if let Some(grams_min) = item.grams_min {
            kcal_min += round_kcal(item.kcal_per_100g * grams_min / 100.0);
        }
        if let Some(grams_max) = item.grams_max {
            kcal_max += round_kcal(item.kcal_per_100g * grams_max / 100.0);
        }
    }

    if kcal_min == 0 {
        kcal_min = scale_kcal(kcal_mean, 0.9);
    }
    if kcal_max == 0 {
        kcal_max = scale_kcal(kcal_mean, 1.1);
    }

    MealSummary {
        kcal_mean,
        kcal_min,
        kcal_max,
        confidence: SUMMARY_CONFIDENCE,
        method_badge: AnalysisMethod::D2,
    }
}

/// Summary recomputed from a bare kcal mean, used after a manual portion
/// adjustment where per-item bounds are no longer trustworthy: bounds are
/// always mean ±10%.
#[must_use]
pub fn summary_from_mean(kcal_mean: i64) -> MealSummary {
    MealSummary {
        kcal_mean,
        kcal_min: scale_kcal(kcal_mean, 0.9),
        kcal_max: scale_kcal(kcal_mean, 1.1),
        confidence: SUMMARY_CONFIDENCE,
        method_badge: AnalysisMethod::D2,
    }
}

/// Scale an integer kcal total and round back to an integer
#[allow(clippy::cast_precision_loss)]
#[must_use]
fn scale_kcal(kcal: i64, factor: f64) -> i64 {
    round_kcal(kcal as f64 * factor)
}
