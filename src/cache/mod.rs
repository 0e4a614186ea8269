// ABOUTME: Content-addressable cache for full analysis results keyed by image hash
// ABOUTME: Pluggable backend support (in-memory, Redis) behind one provider trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

/// Backend selection between Redis and in-process memory
pub mod factory;
/// LRU-backed in-process cache
pub mod memory;
/// Redis-backed shared cache
pub mod redis;

pub use factory::Cache;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::environment::RedisConnectionConfig;
use crate::errors::AppResult;

/// Entry cap applied to the in-memory backend when none is configured
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// How often the in-memory sweeper looks for expired entries
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Prefix shared by every analysis cache key
pub const IMAGE_KEY_PREFIX: &str = "img:sha256:";

/// Backend-neutral operations every analysis cache supports
#[async_trait::async_trait]
pub trait CacheProvider: Send + Sync + Clone {
    /// Construct a backend from `config`
    ///
    /// # Errors
    ///
    /// Backend initialization failed (bad Redis URL, connection refused)
    async fn new(config: CacheConfig) -> AppResult<Self>
    where
        Self: Sized;

    /// Serialize `value` and store it under `key` for `ttl`
    ///
    /// # Errors
    ///
    /// Serialization failed or the backend rejected the write
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()>;

    /// Fetch and deserialize the entry at `key`; `None` on miss or expiry
    ///
    /// # Errors
    ///
    /// Backend failure, or the stored payload no longer deserializes
    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>>;

    /// Drop the entry at `key` if present
    ///
    /// # Errors
    ///
    /// The backend rejected the delete
    async fn invalidate(&self, key: &CacheKey) -> AppResult<()>;

    /// Whether a live entry is stored at `key`
    ///
    /// # Errors
    ///
    /// The backend could not be queried
    async fn exists(&self, key: &CacheKey) -> AppResult<bool>;

    /// Remaining lifetime of the entry at `key`, `None` when absent or persistent
    ///
    /// # Errors
    ///
    /// The backend could not be queried
    async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>>;

    /// Probe the backend
    ///
    /// # Errors
    ///
    /// The backend is unreachable or unhealthy
    async fn health_check(&self) -> AppResult<()>;

    /// Remove every analysis entry; used by tests and admin tooling
    ///
    /// # Errors
    ///
    /// The scan or delete failed
    async fn clear_all(&self) -> AppResult<()>;
}

/// Cache tuning resolved from server configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry cap for the LRU in-memory backend
    pub max_entries: usize,
    /// Redis connection URL (selects the Redis backend when present)
    pub redis_url: Option<String>,
    /// How often the in-memory sweeper runs
    pub cleanup_interval: Duration,
    /// Enable background cleanup task (disable in tests to avoid runtime churn)
    pub enable_background_cleanup: bool,
    /// Connection retry/timeout tuning for Redis
    pub redis_connection: RedisConnectionConfig,
    /// TTL applied to stored analysis results
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            redis_url: None,
            cleanup_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            enable_background_cleanup: true,
            redis_connection: RedisConnectionConfig::default(),
            default_ttl: Duration::from_secs(crate::config::DEFAULT_IMAGE_CACHE_TTL_SECS),
        }
    }
}

impl CacheConfig {
    /// Build cache configuration from the resolved server configuration
    #[must_use]
    pub fn from_server_config(config: &crate::config::ServerConfig) -> Self {
        Self {
            max_entries: config.cache.max_entries,
            redis_url: config.redis.url.clone(),
            cleanup_interval: Duration::from_secs(config.cache.cleanup_interval_secs),
            enable_background_cleanup: true,
            redis_connection: config.redis.connection.clone(),
            default_ttl: config.cache.ttl,
        }
    }
}

/// Cache key for a stored analysis result.
///
/// Keys are derived from image content only: identical bytes map to the same
/// key regardless of which meal or user uploaded them, so repeat uploads of
/// the same photo dedupe provider compute across the whole system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    sha256_hex: String,
}

impl CacheKey {
    /// Key for raw image bytes
    #[must_use]
    pub fn for_image(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self {
            sha256_hex: hex::encode(digest),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{IMAGE_KEY_PREFIX}{}", self.sha256_hex)
    }
}
