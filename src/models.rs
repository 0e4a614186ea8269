// ABOUTME: Core data models for the meal analysis pipeline
// ABOUTME: Defines Label, Portion, Canonical, WhyEntry, MealSummary and persistence record types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! # Data Models
//!
//! Core data structures used throughout the analysis pipeline. These models
//! provide a single representation of vision output, portion estimates and
//! nutrition data regardless of which provider produced them.
//!
//! ## Design Principles
//!
//! - **Provider Agnostic**: labels and portions look the same whether they
//!   came from an OpenAI-style endpoint, an Anthropic-style endpoint, or the
//!   demo stub
//! - **Serializable**: the JSON shapes match what the collaborator HTTP layer
//!   and the persisted `why_json` audit trail expect (camelCase field names)
//! - **Type Safe**: enums for statuses, sources and methods instead of loose
//!   strings

use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalized bounding box for a detected food item, each coordinate in [0,1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelRegion {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub w: f64,
    /// Height
    pub h: f64,
}

impl LabelRegion {
    /// Clamp every coordinate into [0,1]
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
            w: self.w.clamp(0.0, 1.0),
            h: self.h.clamp(0.0, 1.0),
        }
    }
}

/// A normalized food label extracted from an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Lowercase, trimmed food name
    pub name: String,
    /// Detection confidence in [0,1]
    pub confidence: f64,
    /// Bounding box when the provider reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<LabelRegion>,
}

/// How a portion estimate was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortionMethod {
    /// Estimated by the LLM from the image
    Llm,
    /// Estimated from the static per-food rule table
    Rule,
    /// Set by a user adjustment
    User,
}

impl Display for PortionMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Llm => write!(f, "llm"),
            Self::Rule => write!(f, "rule"),
            Self::User => write!(f, "user"),
        }
    }
}

/// An estimated edible mass for one label, grams clamped to [5, 1000]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portion {
    /// Lower bound when the estimator supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grams_min: Option<f64>,
    /// Upper bound when the estimator supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grams_max: Option<f64>,
    /// Mean estimate, always present
    pub grams_mean: f64,
    /// Estimation method
    pub method: PortionMethod,
}

/// Origin of a canonical nutrient profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalSource {
    /// Imported from the USDA FoodData Central dataset
    #[serde(rename = "USDA")]
    Usda,
    /// Imported from Open Food Facts
    #[serde(rename = "OFF")]
    Off,
    /// Synthesized placeholder created on resolver miss
    #[serde(rename = "custom")]
    Custom,
}

impl CanonicalSource {
    /// Parse from the stored string form
    #[must_use]
    pub fn from_str_or_custom(s: &str) -> Self {
        match s {
            "USDA" => Self::Usda,
            "OFF" => Self::Off,
            _ => Self::Custom,
        }
    }

    /// Stored string form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Usda => "USDA",
            Self::Off => "OFF",
            Self::Custom => "custom",
        }
    }
}

impl Display for CanonicalSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Macro nutrients per 100 grams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Per100g {
    /// Kilocalories per 100g
    pub kcal: f64,
    /// Protein grams per 100g
    pub protein: f64,
    /// Fat grams per 100g
    pub fat: f64,
    /// Carbohydrate grams per 100g
    pub carbs: f64,
}

/// A reference nutrient profile for one food name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canonical {
    /// Stable identifier
    pub id: Uuid,
    /// Lowercase food name (unique in the store)
    pub name: String,
    /// Profile origin
    pub source: CanonicalSource,
    /// Kilocalories per 100g
    pub kcal_per_100g: f64,
    /// Protein grams per 100g
    pub protein_per_100g: f64,
    /// Fat grams per 100g
    pub fat_per_100g: f64,
    /// Carbohydrate grams per 100g
    pub carbs_per_100g: f64,
    /// Similarity score when this profile was fuzzy-matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Canonical {
    /// Zero-valued custom profile synthesized for an unresolvable label
    #[must_use]
    pub fn synthesized(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source: CanonicalSource::Custom,
            kcal_per_100g: 0.0,
            protein_per_100g: 0.0,
            fat_per_100g: 0.0,
            carbs_per_100g: 0.0,
            score: None,
        }
    }

    /// Macro profile view used by the composer
    #[must_use]
    pub const fn per_100g(&self) -> Per100g {
        Per100g {
            kcal: self.kcal_per_100g,
            protein: self.protein_per_100g,
            fat: self.fat_per_100g,
            carbs: self.carbs_per_100g,
        }
    }

    /// Compact reference stored inside why-entries
    #[must_use]
    pub fn reference(&self) -> CanonicalRef {
        CanonicalRef {
            id: self.id,
            name: self.name.clone(),
            source: self.source,
            score: self.score,
        }
    }
}

/// Compact canonical summary embedded in audit entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRef {
    /// Canonical id (used for cache-replay re-resolution)
    pub id: Uuid,
    /// Food name at match time
    pub name: String,
    /// Profile origin
    pub source: CanonicalSource,
    /// Similarity score when fuzzy-matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Derived nutrition for one label at its estimated grams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComputedItem {
    /// Kilocalories, rounded to integer
    pub kcal: i64,
    /// Protein grams, one decimal
    pub protein: f64,
    /// Fat grams, one decimal
    pub fat: f64,
    /// Carbohydrate grams, one decimal
    pub carbs: f64,
}

/// Which estimation method produced a result (audit tag and meal badge)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    /// Barcode scan (collaborator feature, reserved)
    Barcode,
    /// Augmented-reality measurement (collaborator feature, reserved)
    Ar,
    /// Two-dimensional image estimation - this pipeline
    D2,
    /// Manual user adjustment
    User,
}

impl AnalysisMethod {
    /// Parse from the stored string form
    #[must_use]
    pub fn from_str_or_d2(s: &str) -> Self {
        match s {
            "barcode" => Self::Barcode,
            "ar" => Self::Ar,
            "user" => Self::User,
            _ => Self::D2,
        }
    }

    /// Stored string form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Barcode => "barcode",
            Self::Ar => "ar",
            Self::D2 => "d2",
            Self::User => "user",
        }
    }
}

impl Display for AnalysisMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Meal-level nutrition summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSummary {
    /// Sum of per-item mean kcal
    pub kcal_mean: i64,
    /// Sum of per-item lower-bound kcal, or mean×0.9 when no item had bounds
    pub kcal_min: i64,
    /// Sum of per-item upper-bound kcal, or mean×1.1 when no item had bounds
    pub kcal_max: i64,
    /// Fixed summary confidence
    pub confidence: f64,
    /// Badge identifying the estimation method
    pub method_badge: AnalysisMethod,
}

/// Audit record explaining how one meal item's nutrition was derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhyEntry {
    /// Label the item was derived from
    pub label: String,
    /// Portion estimate used
    pub portion: Portion,
    /// Canonical profile the label resolved to
    pub matched: CanonicalRef,
    /// Macro profile used for composition
    #[serde(rename = "per100g")]
    pub per_100g: Per100g,
    /// Estimation method
    pub method: AnalysisMethod,
    /// Whether this entry was replayed from the analysis cache
    pub cache: bool,
    /// Optional provider evidence (raw confidence, region)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
}

/// Why-entry variant written when a pipeline run fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Error message that terminalized the meal
    pub error: String,
    /// Failure time
    pub timestamp: DateTime<Utc>,
}

/// Why-entry variant appended by a manual portion adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    /// Adjusted item's label
    pub label: String,
    /// New portion after the adjustment
    pub portion: Portion,
    /// Always [`AnalysisMethod::User`]
    pub method: AnalysisMethod,
    /// Adjustment time
    pub timestamp: DateTime<Utc>,
}

/// Meal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealStatus {
    /// Created, not yet picked up
    Pending,
    /// Analysis in progress
    Processing,
    /// Terminal: analysis complete
    Ready,
    /// Terminal: analysis failed
    Failed,
}

impl MealStatus {
    /// Parse from the stored string form
    #[must_use]
    pub fn from_str_or_pending(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "ready" => Self::Ready,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Stored string form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// `ready` and `failed` are terminal; the orchestrator never re-enters them
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

impl Display for MealStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// A meal row as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealRecord {
    /// Stable identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Photo asset this meal was created from
    pub asset_id: Option<Uuid>,
    /// Lifecycle status
    pub status: MealStatus,
    /// Summary kcal mean when ready
    pub kcal_mean: Option<i64>,
    /// Summary kcal lower bound when ready
    pub kcal_min: Option<i64>,
    /// Summary kcal upper bound when ready
    pub kcal_max: Option<i64>,
    /// Summary confidence when ready
    pub confidence: Option<f64>,
    /// Method badge when ready
    pub method_badge: Option<String>,
    /// Ordered append-only audit trail (heterogeneous entries)
    pub why_json: serde_json::Value,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// A meal item row as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealItemRecord {
    /// Stable identifier
    pub id: Uuid,
    /// Owning meal
    pub meal_id: Uuid,
    /// Food label
    pub label: String,
    /// Portion lower bound
    pub grams_min: Option<f64>,
    /// Portion upper bound
    pub grams_max: Option<f64>,
    /// Portion mean
    pub grams_mean: Option<f64>,
    /// Computed kilocalories
    pub kcal: Option<i64>,
    /// Computed protein grams
    pub protein: Option<f64>,
    /// Computed fat grams
    pub fat: Option<f64>,
    /// Computed carbohydrate grams
    pub carbs: Option<f64>,
    /// Canonical profile used for computation
    pub canonical_id: Option<Uuid>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Insert payload for one computed meal item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMealItem {
    /// Food label
    pub label: String,
    /// Portion lower bound
    pub grams_min: Option<f64>,
    /// Portion upper bound
    pub grams_max: Option<f64>,
    /// Portion mean
    pub grams_mean: f64,
    /// Computed kilocalories
    pub kcal: i64,
    /// Computed protein grams
    pub protein: f64,
    /// Computed fat grams
    pub fat: f64,
    /// Computed carbohydrate grams
    pub carbs: f64,
    /// Canonical profile used for computation
    pub canonical_id: Option<Uuid>,
}

/// A media asset row as persisted (collaborator-owned, read by the core)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAssetRecord {
    /// Stable identifier
    pub id: Uuid,
    /// Owning user
    pub owner_id: Uuid,
    /// Key in the blob store
    pub storage_key: String,
    /// MIME type as uploaded
    pub mime: String,
    /// Byte size when known
    pub size: Option<i64>,
    /// Pixel width when known
    pub width: Option<i64>,
    /// Pixel height when known
    pub height: Option<i64>,
    /// Content hash when known
    pub sha256: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Value stored in the analysis cache under the image hash key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnalysis {
    /// Meal summary computed for these image bytes
    pub summary: MealSummary,
    /// Why-entries computed for these image bytes (stored with `cache=false`,
    /// replayed with `cache=true`)
    pub items: Vec<WhyEntry>,
}

/// Result of one orchestrator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// Analyzed meal
    pub meal_id: Uuid,
    /// Terminal status reached (`ready` or `failed`)
    pub status: MealStatus,
    /// Summary when the run succeeded
    pub summary: Option<MealSummary>,
    /// Why-entries when the run succeeded
    pub items: Vec<WhyEntry>,
    /// Whether the result was replayed from the cache
    pub cache_hit: bool,
}

impl AnalysisOutcome {
    /// Failed outcome with no computed data
    #[must_use]
    pub const fn failed(meal_id: Uuid) -> Self {
        Self {
            meal_id,
            status: MealStatus::Failed,
            summary: None,
            items: Vec::new(),
            cache_hit: false,
        }
    }
}
