// ABOUTME: Cache factory selecting the backend from configuration
// ABOUTME: Redis when a URL is configured, in-memory LRU otherwise
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{memory::InMemoryCache, redis::RedisCache, CacheConfig, CacheKey, CacheProvider};
use crate::errors::AppResult;

/// Unified cache interface over the configured backend
#[derive(Clone)]
pub enum Cache {
    /// In-memory LRU backend (single instance, tests, dev)
    Memory {
        /// Backend instance
        inner: InMemoryCache,
        /// TTL applied when callers use [`Cache::default_ttl`]
        default_ttl: Duration,
    },
    /// Redis backend (multi-instance deployments)
    Redis {
        /// Backend instance
        inner: RedisCache,
        /// TTL applied when callers use [`Cache::default_ttl`]
        default_ttl: Duration,
    },
}

impl Cache {
    /// Create a cache instance based on configuration: Redis when a URL is
    /// configured, in-memory otherwise.
    ///
    /// # Errors
    ///
    /// Backend initialization failed
    pub async fn new(config: CacheConfig) -> AppResult<Self> {
        let default_ttl = config.default_ttl;

        if config.redis_url.is_some() {
            tracing::info!("Initializing Redis analysis cache");
            let inner = RedisCache::new(config).await?;
            return Ok(Self::Redis { inner, default_ttl });
        }

        tracing::info!(
            "Initializing in-memory analysis cache (max entries: {})",
            config.max_entries
        );
        let inner = InMemoryCache::new(config).await?;
        Ok(Self::Memory { inner, default_ttl })
    }

    /// TTL configured for stored analysis results
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        match self {
            Self::Memory { default_ttl, .. } | Self::Redis { default_ttl, .. } => *default_ttl,
        }
    }

    /// Serialize and store `value` under `key` for `ttl`
    ///
    /// # Errors
    ///
    /// Serialization failed or the backend rejected the write
    pub async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        match self {
            Self::Memory { inner, .. } => inner.set(key, value, ttl).await,
            Self::Redis { inner, .. } => inner.set(key, value, ttl).await,
        }
    }

    /// Fetch the entry at `key`; `None` on miss or expiry
    ///
    /// # Errors
    ///
    /// Backend failure, or a stored payload that no longer deserializes
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        match self {
            Self::Memory { inner, .. } => inner.get(key).await,
            Self::Redis { inner, .. } => inner.get(key).await,
        }
    }

    /// Drop the entry at `key` if present
    ///
    /// # Errors
    ///
    /// The backend rejected the delete
    pub async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        match self {
            Self::Memory { inner, .. } => inner.invalidate(key).await,
            Self::Redis { inner, .. } => inner.invalidate(key).await,
        }
    }

    /// Whether a live entry is stored at `key`
    ///
    /// # Errors
    ///
    /// The backend could not be queried
    pub async fn exists(&self, key: &CacheKey) -> AppResult<bool> {
        match self {
            Self::Memory { inner, .. } => inner.exists(key).await,
            Self::Redis { inner, .. } => inner.exists(key).await,
        }
    }

    /// Remaining lifetime of the entry at `key`
    ///
    /// # Errors
    ///
    /// The backend could not be queried
    pub async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>> {
        match self {
            Self::Memory { inner, .. } => inner.ttl(key).await,
            Self::Redis { inner, .. } => inner.ttl(key).await,
        }
    }

    /// Probe the selected backend
    ///
    /// # Errors
    ///
    /// The backend is unreachable or unhealthy
    pub async fn health_check(&self) -> AppResult<()> {
        match self {
            Self::Memory { inner, .. } => inner.health_check().await,
            Self::Redis { inner, .. } => inner.health_check().await,
        }
    }

    /// Remove every analysis entry
    ///
    /// # Errors
    ///
    /// The scan or delete failed
    pub async fn clear_all(&self) -> AppResult<()> {
        match self {
            Self::Memory { inner, .. } => inner.clear_all().await,
            Self::Redis { inner, .. } => inner.clear_all().await,
        }
    }

    /// Backend name for startup logs
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Redis { .. } => "redis",
        }
    }
}
