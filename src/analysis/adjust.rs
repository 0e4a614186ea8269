// ABOUTME: Manual portion adjustment for items of finished meals
// ABOUTME: Shifts grams, recomputes nutrition from the canonical profile, rewrites the summary

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::compose;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{
    AdjustmentEntry, AnalysisMethod, MealItemRecord, MealStatus, MealSummary, Portion,
    PortionMethod,
};

/// Result of a successful adjustment
#[derive(Debug, Clone)]
pub struct AdjustedMeal {
    /// The item after the grams shift and nutrition recompute
    pub item: MealItemRecord,
    /// The meal summary recomputed from all item kcal
    pub summary: MealSummary,
}

/// Shift one meal item's portion by `grams_delta` grams and recompute its
/// nutrition plus the meal summary.
///
/// Only `ready` meals owned by the caller can be adjusted; an unknown or
/// non-ready meal, or an unknown item, yields `None`. The delta applies to
/// the mean and to whichever bounds the item carries, each clamped at zero.
/// When the item still references a live canonical profile the macros are
/// recomputed from it at the new mean grams; otherwise the stored macros are
/// scaled by the grams ratio. The summary collapses to the ±10% band around
/// the new kcal total, and a `{label, portion, method: user, timestamp}`
/// entry is appended to the meal's audit trail.
///
/// # Errors
///
/// Returns an error if a database read or write fails
pub async fn adjust_meal_item(
    database: &Database,
    meal_id: Uuid,
    item_id: Uuid,
    grams_delta: f64,
    user_id: Uuid,
) -> AppResult<Option<AdjustedMeal>> {
    let Some(meal) = database.get_meal_for_user(meal_id, user_id).await? else {
        return Ok(None);
    };
    if meal.status != MealStatus::Ready {
        debug!(
            "Meal {meal_id} is {}; adjustments only apply to ready meals",
            meal.status
        );
        return Ok(None);
    }
    let Some(mut item) = database.get_meal_item(item_id, meal_id).await? else {
        return Ok(None);
    };

    let old_mean = item.grams_mean.unwrap_or(0.0);
    let new_mean = (old_mean + grams_delta).max(0.0);
    item.grams_mean = Some(new_mean);
    item.grams_min = item.grams_min.map(|g| (g + grams_delta).max(0.0));
    item.grams_max = item.grams_max.map(|g| (g + grams_delta).max(0.0));

    let canonical = match item.canonical_id {
        Some(canonical_id) => database.get_canonical(canonical_id).await?,
        None => None,
    };
    if let Some(canonical) = canonical {
        let computed = compose::compute_item(new_mean, canonical.per_100g());
        item.kcal = Some(computed.kcal);
        item.protein = Some(computed.protein);
        item.fat = Some(computed.fat);
        item.carbs = Some(computed.carbs);
    } else {
        // No canonical profile to recompute from; scale the stored macros by
        // the grams ratio instead
        scale_macros(&mut item, old_mean, new_mean);
    }

    database.update_meal_item(&item).await?;

    let items = database.get_meal_items(meal_id).await?;
    let kcal_total: i64 = items.iter().filter_map(|i| i.kcal).sum();
    let summary = compose::summary_from_mean(kcal_total);

    let entry = AdjustmentEntry {
        label: item.label.clone(),
        portion: Portion {
            grams_min: item.grams_min,
            grams_max: item.grams_max,
            grams_mean: new_mean,
            method: PortionMethod::User,
        },
        method: AnalysisMethod::User,
        timestamp: Utc::now(),
    };
    let why_json = append_entry(meal.why_json, &entry)?;
    database
        .update_meal_summary(meal_id, &summary, &why_json)
        .await?;

    info!("Adjusted item {item_id} of meal {meal_id} by {grams_delta}g to {new_mean}g");
    Ok(Some(AdjustedMeal { item, summary }))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn scale_macros(item: &mut MealItemRecord, old_mean: f64, new_mean: f64) {
    let denom = if old_mean == 0.0 { 1.0 } else { old_mean };
    let ratio = new_mean / denom;
    item.kcal = item.kcal.map(|k| (k as f64 * ratio).round() as i64);
    item.protein = item.protein.map(|p| round_macro(p * ratio));
    item.fat = item.fat.map(|f| round_macro(f * ratio));
    item.carbs = item.carbs.map(|c| round_macro(c * ratio));
}

fn round_macro(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Append an adjustment entry to an existing audit trail; a trail that is
/// not an array (legacy or failed meals) is replaced by a fresh one
fn append_entry(
    existing: serde_json::Value,
    entry: &AdjustmentEntry,
) -> AppResult<serde_json::Value> {
    let mut entries = match existing {
        serde_json::Value::Array(entries) => entries,
        _ => Vec::new(),
    };
    entries.push(serde_json::to_value(entry)?);
    Ok(serde_json::Value::Array(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(grams_mean: f64, kcal: i64) -> MealItemRecord {
        MealItemRecord {
            id: Uuid::new_v4(),
            meal_id: Uuid::new_v4(),
            label: "rice".to_owned(),
            grams_min: Some(80.0),
            grams_max: Some(180.0),
            grams_mean: Some(grams_mean),
            kcal: Some(kcal),
            protein: Some(2.4),
            fat: Some(0.4),
            carbs: Some(28.0),
            canonical_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn scaling_without_canonical_uses_grams_ratio() {
        let mut it = item(120.0, 156);
        scale_macros(&mut it, 120.0, 180.0);
        assert_eq!(it.kcal, Some(234));
        assert_eq!(it.protein, Some(3.6));
        assert_eq!(it.fat, Some(0.6));
        assert_eq!(it.carbs, Some(42.0));
    }

    #[test]
    fn scaling_from_zero_mean_treats_denominator_as_one() {
        let mut it = item(0.0, 10);
        scale_macros(&mut it, 0.0, 50.0);
        // ratio = 50 / 1
        assert_eq!(it.kcal, Some(500));
    }

    #[test]
    fn append_entry_extends_existing_array() {
        let existing = serde_json::json!([{"label": "rice"}]);
        let entry = AdjustmentEntry {
            label: "rice".to_owned(),
            portion: Portion {
                grams_min: None,
                grams_max: None,
                grams_mean: 150.0,
                method: PortionMethod::User,
            },
            method: AnalysisMethod::User,
            timestamp: Utc::now(),
        };
        let out = append_entry(existing, &entry).unwrap();
        let entries = out.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["method"], "user");
        assert_eq!(entries[1]["portion"]["gramsMean"], 150.0);
    }

    #[test]
    fn append_entry_replaces_non_array_trail() {
        let entry = AdjustmentEntry {
            label: "rice".to_owned(),
            portion: Portion {
                grams_min: None,
                grams_max: None,
                grams_mean: 150.0,
                method: PortionMethod::User,
            },
            method: AnalysisMethod::User,
            timestamp: Utc::now(),
        };
        let out = append_entry(serde_json::Value::Null, &entry).unwrap();
        assert_eq!(out.as_array().unwrap().len(), 1);
    }
}
