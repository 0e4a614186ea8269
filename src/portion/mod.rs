// ABOUTME: Portion estimation combining LLM gram hints with a rule-based fallback table
// ABOUTME: Produces clamped, rounded per-label Portion values and never fails the pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! # Portion Estimator
//!
//! Turns extracted labels into per-label gram estimates. The primary strategy
//! is a single LLM call covering the whole label list; when that call fails,
//! the entire batch degrades to the rule table. When it succeeds but skips
//! items, only the missing items are filled from rules. The `rule` portion
//! mode bypasses the LLM entirely.
//!
//! Estimation is infallible by contract: whatever happens upstream, every
//! label gets a portion.

mod rules;

pub use rules::rule_based_portion;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::PortionMode;
use crate::errors::AppResult;
use crate::models::{Label, Portion, PortionMethod};
use crate::vision::{PortionHint, VisionProvider, VisionRouter};

/// Default grams when a hint carries no usable mean
const DEFAULT_GRAMS: f64 = 150.0;

/// Lower clamp bound for any estimate
const MIN_GRAMS: f64 = 5.0;

/// Upper clamp bound for any estimate
const MAX_GRAMS: f64 = 1000.0;

/// Portion estimator over the configured vision provider
pub struct PortionEstimator {
    vision: Arc<VisionRouter>,
    mode: PortionMode,
}

impl PortionEstimator {
    /// Create an estimator with the given strategy
    #[must_use]
    pub const fn new(vision: Arc<VisionRouter>, mode: PortionMode) -> Self {
        Self { vision, mode }
    }

    /// Estimate portions for every label
    ///
    /// Infallible: provider failures degrade the whole batch to the rule
    /// table, and items missing from a successful response are filled
    /// individually.
    #[instrument(skip(self, image, labels), fields(mode = %self.mode, label_count = labels.len()))]
    pub async fn estimate(&self, image: &[u8], labels: &[Label]) -> HashMap<String, Portion> {
        if self.mode == PortionMode::Rule {
            return Self::estimate_with_rules(labels);
        }

        match self.estimate_with_llm(image, labels).await {
            Ok(portions) => portions,
            Err(e) => {
                warn!("LLM portion estimation failed, falling back to rules: {}", e);
                Self::estimate_with_rules(labels)
            }
        }
    }

    /// One LLM call for the whole label list, with per-item rule fill
    async fn estimate_with_llm(
        &self,
        image: &[u8],
        labels: &[Label],
    ) -> AppResult<HashMap<String, Portion>> {
        let hints = self.vision.portion_hints(image, labels).await?;

        let mut portions: HashMap<String, Portion> = HashMap::with_capacity(labels.len());
        for hint in hints {
            portions.insert(hint.name.clone(), Self::portion_from_hint(&hint));
        }

        // Items the provider skipped fall back to the rule table individually
        for label in labels {
            if !portions.contains_key(&label.name) {
                portions.insert(label.name.clone(), rule_based_portion(&label.name));
            }
        }

        debug!("Estimated portions for {} items", portions.len());
        Ok(portions)
    }

    /// Rule-table estimates for every label
    fn estimate_with_rules(labels: &[Label]) -> HashMap<String, Portion> {
        labels
            .iter()
            .map(|label| (label.name.clone(), rule_based_portion(&label.name)))
            .collect()
    }

    /// Normalize one raw hint: missing bounds fall back to the mean, a
    /// missing mean falls back to the default, then clamp and round
    fn portion_from_hint(hint: &PortionHint) -> Portion {
        let mean_raw = usable(hint.grams_mean);
        let mean = clamp_grams(mean_raw.unwrap_or(DEFAULT_GRAMS));
        let min = clamp_grams(usable(hint.grams_min).or(mean_raw).unwrap_or(DEFAULT_GRAMS));
        let max = clamp_grams(usable(hint.grams_max).or(mean_raw).unwrap_or(DEFAULT_GRAMS));

        Portion {
            grams_min: Some(min),
            grams_max: Some(max),
            grams_mean: mean,
            method: PortionMethod::Llm,
        }
    }
}

/// Zero and non-finite values count as "no estimate"
fn usable(grams: Option<f64>) -> Option<f64> {
    grams.filter(|g| g.is_finite() && *g != 0.0)
}

/// Clamp into [5, 1000] grams, then round to a whole gram
fn clamp_grams(grams: f64) -> f64 {
    grams.clamp(MIN_GRAMS, MAX_GRAMS).round()
}
