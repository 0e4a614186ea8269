// ABOUTME: Redis-backed analysis cache over a managed async connection
// ABOUTME: Lets replayed results survive restarts and be shared between instances
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

use std::time::Duration;

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{CacheConfig, CacheKey, CacheProvider, IMAGE_KEY_PREFIX};
use crate::config::environment::RedisConnectionConfig;
use crate::errors::{AppError, AppResult};

/// Log a failed Redis command and wrap it for the caller
fn cache_err(op: &str, e: &redis::RedisError) -> AppError {
    error!("Redis {op} failed: {e}");
    AppError::internal(format!("Cache error: {e}"))
}

/// Redis cache backend.
///
/// Uses `ConnectionManager` for automatic reconnection. Keys are stored
/// under their rendered `img:sha256:` form, so the analysis namespace stays
/// scoped even on a shared Redis instance.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    async fn new_with_config(config: &CacheConfig) -> AppResult<Self> {
        let redis_url = config
            .redis_url
            .as_ref()
            .ok_or_else(|| AppError::config("Redis cache backend selected without a redis_url"))?;
        let conn_config = &config.redis_connection;

        info!(
            url = %redis_url,
            connect_timeout_secs = conn_config.connection_timeout_secs,
            response_timeout_secs = conn_config.response_timeout_secs,
            retries = conn_config.initial_connection_retries,
            "Connecting to Redis"
        );

        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| AppError::config(format!("Invalid Redis URL: {e}")))?;
        let manager = Self::connect_with_retry(&client, conn_config).await?;

        info!("Redis cache backend ready");
        Ok(Self { manager })
    }

    /// Establish the managed connection, doubling the retry delay after
    /// every failed attempt up to the configured cap
    async fn connect_with_retry(
        client: &redis::Client,
        conn_config: &RedisConnectionConfig,
    ) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
            .set_response_timeout(Duration::from_secs(conn_config.response_timeout_secs))
            .set_number_of_retries(conn_config.reconnection_retries)
            .set_exponent_base(conn_config.retry_exponent_base)
            .set_max_delay(conn_config.max_retry_delay_ms);

        let attempts = conn_config.initial_connection_retries + 1;
        let mut delay_ms = conn_config.initial_retry_delay_ms;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 1 {
                        info!("Redis connection established on attempt {attempt}");
                    }
                    return Ok(manager);
                }
                Err(e) if attempt >= attempts => {
                    return Err(AppError::internal(format!(
                        "Failed to connect to Redis after {attempts} attempts: {e}"
                    )));
                }
                Err(e) => {
                    warn!(
                        "Redis connection attempt {attempt}/{attempts} failed, \
                         retrying in {delay_ms}ms: {e}"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(conn_config.max_retry_delay_ms);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl CacheProvider for RedisCache {
    async fn new(config: CacheConfig) -> AppResult<Self>
    where
        Self: Sized,
    {
        Self::new_with_config(&config).await
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let payload = serde_json::to_vec(value)?;
        let mut conn = self.manager.clone();

        // SETEX writes the value and its expiry in one round trip
        conn.set_ex::<_, _, ()>(&key.to_string(), payload, ttl.as_secs())
            .await
            .map_err(|e| cache_err("SETEX", &e))?;
        Ok(())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let mut conn = self.manager.clone();

        let payload: Option<Vec<u8>> = conn
            .get(&key.to_string())
            .await
            .map_err(|e| cache_err("GET", &e))?;
        payload
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(AppError::from)
    }

    async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        let mut conn = self.manager.clone();

        conn.del::<_, ()>(&key.to_string())
            .await
            .map_err(|e| cache_err("DEL", &e))?;
        Ok(())
    }

    async fn exists(&self, key: &CacheKey) -> AppResult<bool> {
        let mut conn = self.manager.clone();

        conn.exists(&key.to_string())
            .await
            .map_err(|e| cache_err("EXISTS", &e))
    }

    async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>> {
        let mut conn = self.manager.clone();

        let secs: i64 = conn
            .ttl(&key.to_string())
            .await
            .map_err(|e| cache_err("TTL", &e))?;

        // -2 means no such key, -1 means no expiry set
        #[allow(clippy::cast_sign_loss)]
        let remaining = (secs > 0).then(|| Duration::from_secs(secs as u64));
        Ok(remaining)
    }

    async fn health_check(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();

        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| cache_err("PING", &e))?;
        if response == "PONG" {
            return Ok(());
        }
        Err(AppError::internal(format!(
            "Cache error: unexpected PING response '{response}'"
        )))
    }

    async fn clear_all(&self) -> AppResult<()> {
        // Only touch the analysis namespace; the Redis instance may be shared
        let pattern = format!("{IMAGE_KEY_PREFIX}*");
        let mut conn = self.manager.clone();
        let mut cursor = 0_u64;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| cache_err("SCAN", &e))?;

            if !batch.is_empty() {
                conn.del::<_, u64>(&batch)
                    .await
                    .map_err(|e| cache_err("DEL", &e))?;
            }

            cursor = next;
            if cursor == 0 {
                return Ok(());
            }
        }
    }
}
