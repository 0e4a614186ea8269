// ABOUTME: Vision provider abstraction for food label extraction and portion hints
// ABOUTME: Defines the VisionProvider trait, shared response normalization, and the VisionRouter selector
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! # Vision Provider Service Provider Interface
//!
//! This module defines the contract that vision providers must implement to
//! feed the analysis pipeline. All providers produce the same normalized
//! output regardless of the underlying endpoint, so the orchestrator never
//! branches on which one is configured.
//!
//! ## Key Concepts
//!
//! - **`VisionProvider`**: async trait for label extraction and portion hints
//! - **`VisionRouter`**: enum dispatch over the configured provider, resolved
//!   once at startup
//! - **Normalization**: provider JSON is deserialized into private serde
//!   structs, then normalized into [`Label`] values (lowercase names, clamped
//!   confidence and regions, deduplicated, at most [`MAX_LABELS`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use mealsnap::config::ServerConfig;
//! use mealsnap::vision::{VisionProvider, VisionRouter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let router = VisionRouter::from_config(&config.vision)?;
//!     let labels = router.extract_labels(&[0u8; 4]).await?;
//!     println!("{labels:?}");
//!     Ok(())
//! }
//! ```

mod anthropic;
mod demo;
mod openai;
pub mod prompts;

pub use anthropic::AnthropicVisionProvider;
pub use demo::DemoVisionProvider;
pub use openai::OpenAiVisionProvider;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use tracing::info;

use crate::config::{VisionConfig, VisionProviderType};
use crate::errors::{AppError, AppResult};
use crate::models::{Label, LabelRegion};

/// Maximum number of labels any extractor returns
pub const MAX_LABELS: usize = 5;

// ============================================================================
// Provider Trait
// ============================================================================

/// Vision provider trait for label extraction and portion hints
///
/// Implement this trait to add a new vision backend. Both operations take raw
/// image bytes; providers encode them as base64 JPEG payloads themselves.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Unique provider identifier (e.g. "openai", "anthropic", "demo")
    fn name(&self) -> &'static str;

    /// Human-readable display name for the provider
    fn display_name(&self) -> &'static str;

    /// Extract normalized food labels from an image
    ///
    /// Returns 0 to [`MAX_LABELS`] deduplicated labels sorted by descending
    /// confidence. Zero labels is a valid result, not an error.
    async fn extract_labels(&self, image: &[u8]) -> AppResult<Vec<Label>>;

    /// Request raw per-item gram estimates for the given labels
    ///
    /// Hints are unclamped and may omit items or bounds; the portion
    /// estimator fills the gaps from its rule table.
    async fn portion_hints(&self, image: &[u8], labels: &[Label]) -> AppResult<Vec<PortionHint>>;

    /// Check whether the provider endpoint is reachable and credentials work
    async fn health_check(&self) -> AppResult<bool>;
}

/// Raw per-item gram estimate parsed from a provider response
///
/// Bounds are optional and unclamped; `crate::portion` turns hints into
/// final [`crate::models::Portion`] values.
#[derive(Debug, Clone, PartialEq)]
pub struct PortionHint {
    /// Lowercase item name echoed by the provider
    pub name: String,
    /// Lower bound in grams when supplied
    pub grams_min: Option<f64>,
    /// Mean estimate in grams when supplied
    pub grams_mean: Option<f64>,
    /// Upper bound in grams when supplied
    pub grams_max: Option<f64>,
}

// ============================================================================
// Shared Response Payloads
// ============================================================================

/// Label payload requested from every LLM provider
#[derive(Debug, Deserialize)]
struct LabelSheet {
    #[serde(default)]
    items: Vec<RawLabel>,
}

/// One item in the label payload, before normalization
#[derive(Debug, Deserialize)]
struct RawLabel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    region: Option<RawRegion>,
}

/// Raw bounding box coordinates, before clamping
#[derive(Debug, Deserialize)]
struct RawRegion {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    w: f64,
    #[serde(default)]
    h: f64,
}

/// Portion payload requested from every LLM provider
#[derive(Debug, Deserialize)]
struct PortionSheet {
    #[serde(default)]
    items: Vec<RawPortionItem>,
}

/// One item in the portion payload
#[derive(Debug, Deserialize)]
struct RawPortionItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    grams: RawGrams,
}

/// Gram bounds as returned by the provider
#[derive(Debug, Default, Deserialize)]
struct RawGrams {
    min: Option<f64>,
    mean: Option<f64>,
    max: Option<f64>,
}

/// Parse a JSON label payload and normalize it into [`Label`] values
///
/// # Errors
///
/// Returns an error when the payload is not the requested JSON shape.
pub(crate) fn parse_label_payload(provider: &str, content: &str) -> AppResult<Vec<Label>> {
    let sheet: LabelSheet = serde_json::from_str(content).map_err(|e| {
        AppError::invalid_format(format!("{provider} returned malformed label JSON: {e}"))
    })?;

    let labels = sheet
        .items
        .into_iter()
        .map(|raw| Label {
            name: raw.name,
            confidence: raw.confidence,
            region: raw.region.map(|r| LabelRegion {
                x: r.x,
                y: r.y,
                w: r.w,
                h: r.h,
            }),
        })
        .collect();

    Ok(normalize_labels(labels))
}

/// Parse a JSON portion payload into raw [`PortionHint`] values
///
/// # Errors
///
/// Returns an error when the payload is not the requested JSON shape.
pub(crate) fn parse_portion_payload(provider: &str, content: &str) -> AppResult<Vec<PortionHint>> {
    let sheet: PortionSheet = serde_json::from_str(content).map_err(|e| {
        AppError::invalid_format(format!("{provider} returned malformed portion JSON: {e}"))
    })?;

    Ok(sheet
        .items
        .into_iter()
        .map(|item| PortionHint {
            name: item.name.trim().to_lowercase(),
            grams_min: item.grams.min,
            grams_mean: item.grams.mean,
            grams_max: item.grams.max,
        })
        .filter(|hint| !hint.name.is_empty())
        .collect())
}

/// Normalize extracted labels into the pipeline contract
///
/// Lowercases and trims names, drops empty ones, clamps confidence and region
/// coordinates into [0,1], sorts by descending confidence, deduplicates by
/// name keeping the highest-confidence occurrence, and truncates to
/// [`MAX_LABELS`].
#[must_use]
pub fn normalize_labels(labels: Vec<Label>) -> Vec<Label> {
    let mut normalized: Vec<Label> = labels
        .into_iter()
        .map(|label| Label {
            name: label.name.trim().to_lowercase(),
            confidence: label.confidence.clamp(0.0, 1.0),
            region: label.region.map(LabelRegion::clamped),
        })
        .filter(|label| !label.name.is_empty())
        .collect();

    normalized.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut unique = Vec::with_capacity(normalized.len().min(MAX_LABELS));
    let mut seen = HashSet::new();
    for label in normalized {
        if seen.insert(label.name.clone()) {
            unique.push(label);
        }
        if unique.len() == MAX_LABELS {
            break;
        }
    }

    unique
}

// ============================================================================
// Router
// ============================================================================

/// Unified vision provider wrapping the demo stub and the two LLM endpoints
///
/// This enum provides a consistent interface regardless of which underlying
/// provider is configured. Selection happens once at startup; request
/// handling never branches on configuration strings.
pub enum VisionRouter {
    /// Fixed stub labels, no external calls
    Demo(DemoVisionProvider),
    /// `OpenAI`-style chat completions endpoint with `image_url` payloads
    OpenAi(OpenAiVisionProvider),
    /// Anthropic-style messages endpoint with base64 image blocks
    Anthropic(AnthropicVisionProvider),
}

impl VisionRouter {
    /// Build the configured provider
    ///
    /// # Errors
    ///
    /// Returns an error when the selected provider has no API key configured
    /// or the HTTP client cannot be built.
    pub fn from_config(config: &VisionConfig) -> AppResult<Self> {
        let router = match config.provider {
            VisionProviderType::Demo => Self::Demo(DemoVisionProvider::new()),
            VisionProviderType::OpenAi => Self::OpenAi(OpenAiVisionProvider::new(
                &config.openai,
                config.request_timeout,
            )?),
            VisionProviderType::Anthropic => Self::Anthropic(AnthropicVisionProvider::new(
                &config.anthropic,
                config.request_timeout,
            )?),
        };

        info!(
            "Vision provider initialized: {} ({})",
            router.name(),
            router.display_name()
        );

        Ok(router)
    }

    /// Get the configured provider type
    #[must_use]
    pub const fn provider_type(&self) -> VisionProviderType {
        match self {
            Self::Demo(_) => VisionProviderType::Demo,
            Self::OpenAi(_) => VisionProviderType::OpenAi,
            Self::Anthropic(_) => VisionProviderType::Anthropic,
        }
    }
}

impl fmt::Debug for VisionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demo(_) => f.debug_tuple("VisionRouter::Demo").finish(),
            Self::OpenAi(_) => f.debug_tuple("VisionRouter::OpenAi").finish(),
            Self::Anthropic(_) => f.debug_tuple("VisionRouter::Anthropic").finish(),
        }
    }
}

#[async_trait]
impl VisionProvider for VisionRouter {
    fn name(&self) -> &'static str {
        match self {
            Self::Demo(p) => p.name(),
            Self::OpenAi(p) => p.name(),
            Self::Anthropic(p) => p.name(),
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            Self::Demo(p) => p.display_name(),
            Self::OpenAi(p) => p.display_name(),
            Self::Anthropic(p) => p.display_name(),
        }
    }

    async fn extract_labels(&self, image: &[u8]) -> AppResult<Vec<Label>> {
        match self {
            Self::Demo(p) => p.extract_labels(image).await,
            Self::OpenAi(p) => p.extract_labels(image).await,
            Self::Anthropic(p) => p.extract_labels(image).await,
        }
    }

    async fn portion_hints(&self, image: &[u8], labels: &[Label]) -> AppResult<Vec<PortionHint>> {
        match self {
            Self::Demo(p) => p.portion_hints(image, labels).await,
            Self::OpenAi(p) => p.portion_hints(image, labels).await,
            Self::Anthropic(p) => p.portion_hints(image, labels).await,
        }
    }

    async fn health_check(&self) -> AppResult<bool> {
        match self {
            Self::Demo(p) => p.health_check().await,
            Self::OpenAi(p) => p.health_check().await,
            Self::Anthropic(p) => p.health_check().await,
        }
    }
}
