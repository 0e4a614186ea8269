// ABOUTME: Meal analysis pipeline wiring vision, portions, nutrients and persistence together
// ABOUTME: Orchestrator state machine plus lifecycle helpers and manual adjustments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! # Meal Analysis
//!
//! The pipeline that turns one meal photo into persisted nutrition data:
//!
//! ```text
//! image bytes -> sha256 cache check -> label extraction -> portion
//! estimation -> nutrient resolution -> composition -> persistence
//! ```
//!
//! [`MealAnalyzer`] drives the state machine. A run either terminalizes the
//! meal as `ready` (with a summary, item rows and a why-entry audit trail) or
//! as `failed` (with a single `{error, timestamp}` entry); it never leaves a
//! meal in `pending`/`processing`. Identical image bytes replay the cached
//! result without any provider calls.
//!
//! [`lifecycle`] covers meal creation and queue dispatch around the
//! orchestrator; [`adjust_meal_item`] applies manual portion corrections to
//! finished meals.

pub mod lifecycle;

mod adjust;
mod orchestrator;

pub use adjust::{adjust_meal_item, AdjustedMeal};
pub use orchestrator::MealAnalyzer;
