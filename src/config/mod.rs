// ABOUTME: Configuration management module for centralized server settings and parameters
// ABOUTME: Handles environment configs, provider selection, and runtime options
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! Configuration module for the Mealsnap analysis core
//!
//! Centralized configuration management for all components:
//!
//! - **Environment**: server configuration from environment variables
//! - **Types**: strongly typed enums for provider, mode, and level selection
//!
//! Everything is resolved once at startup into a [`ServerConfig`] that is
//! passed by reference into component constructors; components never read
//! ambient environment state directly.

/// Environment and server configuration
pub mod environment;
/// Strongly typed configuration enums
pub mod types;

pub use environment::{
    AnalysisConfig, CacheSettings, DatabaseConfig, DatabaseUrl, MediaConfig, QueueConfig,
    RedisConfig, RedisConnectionConfig, ServerConfig, VisionConfig, VisionProviderCredentials,
    DEFAULT_IMAGE_CACHE_TTL_SECS, DEFAULT_QUEUE_NAME, DEFAULT_VISION_TIMEOUT_SECS,
};
pub use types::{AnalyzeMode, Environment, LogLevel, PortionMode, VisionProviderType};
