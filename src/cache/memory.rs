// ABOUTME: In-memory LRU cache with per-entry TTL for analysis replay data
// ABOUTME: An optional background task sweeps expired entries between lookups
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{CacheConfig, CacheKey, CacheProvider};
use crate::errors::AppResult;

/// One stored value plus its expiry instant
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }

    fn remaining_ttl(&self) -> Option<Duration> {
        self.expires_at.checked_duration_since(Instant::now())
    }
}

/// In-memory cache with LRU eviction and background cleanup.
///
/// The store sits behind `Arc<RwLock<LruCache>>` because the sweeper task
/// spawned at construction needs shared ownership to evict expired entries
/// concurrently with cache operations.
#[derive(Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
    shutdown_tx: Option<Arc<tokio::sync::mpsc::Sender<()>>>,
}

impl InMemoryCache {
    /// Capacity used when the configured `max_entries` is zero
    const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
        Some(n) => n,
        None => unreachable!(),
    };

    fn new_with_config(config: &CacheConfig) -> Self {
        // LruCache requires a non-zero capacity
        let capacity =
            NonZeroUsize::new(config.max_entries).unwrap_or(Self::DEFAULT_CACHE_CAPACITY);
        let store = Arc::new(RwLock::new(LruCache::new(capacity)));

        if !config.enable_background_cleanup {
            return Self {
                store,
                shutdown_tx: None,
            };
        }

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
        let sweep_store = store.clone();
        let every = config.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => Self::sweep_expired(&sweep_store).await,
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Cache sweeper received shutdown signal");
                        break;
                    }
                }
            }
        });

        Self {
            store,
            shutdown_tx: Some(Arc::new(shutdown_tx)),
        }
    }

    /// Drop every expired entry. Two passes; the LRU map cannot lose
    /// entries while it is being iterated.
    async fn sweep_expired(store: &Arc<RwLock<LruCache<String, CacheEntry>>>) {
        let mut guard = store.write().await;
        let stale: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            guard.pop(key);
        }
        drop(guard);

        if !stale.is_empty() {
            tracing::debug!("Swept {} expired cache entries", stale.len());
        }
    }
}

#[async_trait::async_trait]
impl CacheProvider for InMemoryCache {
    async fn new(config: CacheConfig) -> AppResult<Self> {
        Ok(Self::new_with_config(&config))
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let entry = CacheEntry::new(serde_json::to_vec(value)?, ttl);
        // push evicts the least-recently-used entry once capacity is reached
        self.store.write().await.push(key.to_string(), entry);
        Ok(())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let key = key.to_string();
        let mut store = self.store.write().await;

        // get rather than peek so hits refresh their LRU position
        let Some(entry) = store.get(&key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            store.pop(&key);
            return Ok(None);
        }

        let value = serde_json::from_slice(&entry.data)?;
        Ok(Some(value))
    }

    async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        self.store.write().await.pop(&key.to_string());
        Ok(())
    }

    async fn exists(&self, key: &CacheKey) -> AppResult<bool> {
        let key = key.to_string();
        let mut store = self.store.write().await;

        let Some(entry) = store.get(&key) else {
            return Ok(false);
        };
        if entry.is_expired() {
            store.pop(&key);
            return Ok(false);
        }
        Ok(true)
    }

    async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>> {
        let store = self.store.read().await;
        // peek leaves the LRU order untouched; an expired entry has no
        // remaining TTL and reads as absent
        let remaining = store
            .peek(&key.to_string())
            .and_then(CacheEntry::remaining_ttl);
        Ok(remaining)
    }

    async fn health_check(&self) -> AppResult<()> {
        // Nothing to probe; the store lives in-process
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.store.write().await.clear();
        Ok(())
    }
}

impl Drop for InMemoryCache {
    fn drop(&mut self) {
        // Best-effort signal; a closed or full channel means the sweeper is
        // already stopping
        if let Some(tx) = &self.shutdown_tx {
            if let Err(e) = tx.try_send(()) {
                tracing::debug!("Cache sweeper shutdown signal not delivered: {e:?}");
            }
        }
    }
}
