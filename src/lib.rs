// ABOUTME: Main library entry point for the Mealsnap nutrition analysis service
// ABOUTME: Provides the photo-to-nutrition pipeline, persistence, and job processing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

// recursion_limit raised for the deeply nested serde/thiserror derives on
// provider response types
#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # Mealsnap Core
//!
//! Turns a meal photo into a persisted nutrition estimate. An image flows
//! through label extraction, portion estimation, nutrient resolution, and
//! composition, and the result lands on the meal row together with a
//! per-item evidence trail explaining how each number was produced.
//!
//! ## Pipeline stages
//!
//! - [`vision`]: label extraction behind a provider trait (`OpenAI`-style,
//!   Anthropic-style, or a deterministic demo provider for offline use)
//! - [`portion`]: grams estimation, LLM-backed with a rule-table fallback
//! - [`nutrients`]: canonical food resolution with user-scoped custom
//!   entries for anything unknown
//! - [`compose`]: per-item and per-meal arithmetic
//! - [`analysis`]: the orchestrator tying the stages together, including
//!   replay of image-hash cache hits against current nutrient data
//! - [`jobs`]: Redis or in-process queue backends and the retrying worker
//!   pool for async mode
//!
//! ## Entry points
//!
//! Configuration comes entirely from the environment; see
//! `ServerConfig::from_env`. Run workers with the `mealsnap-worker` binary,
//! or drive [`analysis::MealAnalyzer`] directly for inline analysis.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mealsnap::config::environment::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let server = ServerConfig::from_env()?;
//!     println!("analyze mode: {}", server.analysis.mode);
//!     Ok(())
//! }
//! ```

/// Analysis pipeline orchestration, meal lifecycle, and item adjustment
pub mod analysis;

/// Content-addressed analysis cache over Redis or in-process memory
pub mod cache;

/// Per-item and per-meal nutrition arithmetic
pub mod compose;

/// Configuration management from environment variables
pub mod config;

/// `SQLite` persistence for meals, items, canonicals, and media assets
pub mod database;

/// Error types and conversion traits
pub mod errors;

/// Job queue backends and the analysis worker pool
pub mod jobs;

/// Logging configuration and structured logging utilities
pub mod logging;

/// Image storage backends for uploaded meal photos
pub mod media;

/// Core data structures shared across the pipeline
pub mod models;

/// Canonical nutrient resolution with custom-food fallback
pub mod nutrients;

/// Portion estimation from labels and image context
pub mod portion;

/// Vision provider abstraction for food label extraction
pub mod vision;
