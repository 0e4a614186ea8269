// ABOUTME: Nutrient resolution mapping food labels to canonical per-100g profiles
// ABOUTME: Exact match, then trigram similarity, then a persisted zero-valued placeholder
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! # Nutrient Resolver
//!
//! Maps a normalized food label to a canonical per-100g macro profile. The
//! resolution ladder is exact name match, trigram-similarity match, then a
//! zero-valued `custom` placeholder that is persisted so repeat lookups for
//! the same novel label stay stable.
//!
//! Resolution is infallible by contract: a storage failure degrades to an
//! unsaved placeholder rather than aborting the pipeline.

pub mod similarity;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::database::Database;
use crate::models::Canonical;

/// Candidates must score strictly above this to be considered at all
pub const SIMILARITY_FLOOR: f64 = 0.3;

/// The best candidate must score at least this to be accepted
pub const SIMILARITY_ACCEPT: f64 = 0.5;

/// Number of similarity candidates considered per lookup
pub const CANDIDATE_LIMIT: usize = 3;

/// Resolves food labels against the canonical nutrient store
#[derive(Clone)]
pub struct NutrientResolver {
    database: Arc<Database>,
}

impl NutrientResolver {
    /// Create a resolver over the given store
    #[must_use]
    pub const fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Resolve a label to a canonical profile. Never fails: storage errors
    /// degrade to an unsaved zero-valued placeholder.
    pub async fn resolve(&self, label: &str) -> Canonical {
        match self.resolve_inner(label).await {
            Ok(canonical) => canonical,
            Err(e) => {
                warn!("Nutrient resolution degraded for '{label}': {e}");
                Canonical::synthesized(label)
            }
        }
    }

    async fn resolve_inner(&self, label: &str) -> Result<Canonical> {
        if let Some(exact) = self.database.find_canonical_by_name(label).await? {
            debug!("Canonical exact match for '{label}'");
            return Ok(exact);
        }

        let candidates = self
            .database
            .similar_canonicals(label, SIMILARITY_FLOOR, CANDIDATE_LIMIT)
            .await?;
        if let Some(best) = candidates.into_iter().next() {
            let score = best.score.unwrap_or(0.0);
            if score >= SIMILARITY_ACCEPT {
                debug!(
                    "Canonical similarity match for '{label}': '{}' at {score:.2}",
                    best.name
                );
                return Ok(best);
            }
            debug!("Best similarity candidate for '{label}' below accept threshold: {score:.2}");
        }

        // Persist the placeholder so the next lookup for this label is an
        // exact hit; on a name race the stored row wins
        let placeholder = Canonical::synthesized(label);
        let stored = self.database.insert_canonical(&placeholder).await?;
        debug!("Created custom canonical placeholder for '{label}'");
        Ok(stored)
    }
}
