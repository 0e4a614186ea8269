// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, provider selection, and runtime configuration parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! Environment-based configuration management for production deployment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use super::types::{AnalyzeMode, Environment, LogLevel, PortionMode, VisionProviderType};

/// Type-safe database location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// SQLite database with file path
    SQLite {
        /// Path to the database file
        path: PathBuf,
    },
    /// In-memory SQLite (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for parity with stricter backends.
    pub fn parse_url(s: &str) -> Result<Self> {
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            if path_str == ":memory:" {
                Ok(Self::Memory)
            } else {
                Ok(Self::SQLite {
                    path: PathBuf::from(path_str),
                })
            }
        } else {
            // Fallback: treat as SQLite file path
            Ok(Self::SQLite {
                path: PathBuf::from(s),
            })
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/mealsnap.db"),
        }
    }
}

impl std::fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database location
    pub url: DatabaseUrl,
    /// Run migrations automatically on startup
    pub auto_migrate: bool,
}

/// Redis configuration shared by the cache backend and the job queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL; when absent, in-memory backends are used
    pub url: Option<String>,
    /// Connection and retry tuning
    pub connection: RedisConnectionConfig,
}

/// Redis connection and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConnectionConfig {
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Response/command timeout in seconds
    pub response_timeout_secs: u64,
    /// Number of reconnection retries after a connection drop
    pub reconnection_retries: usize,
    /// Exponential backoff base for reconnection delays
    pub retry_exponent_base: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Number of retries for the initial connection at startup
    pub initial_connection_retries: u32,
    /// Initial retry delay in milliseconds (doubles with exponential backoff)
    pub initial_retry_delay_ms: u64,
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 5,
            response_timeout_secs: 10,
            reconnection_retries: 6,
            retry_exponent_base: 2,
            max_retry_delay_ms: 30_000,
            initial_connection_retries: 3,
            initial_retry_delay_ms: 500,
        }
    }
}

impl RedisConnectionConfig {
    /// Load Redis connection configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connection_timeout_secs: env::var("REDIS_CONNECTION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.connection_timeout_secs),
            response_timeout_secs: env::var("REDIS_RESPONSE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.response_timeout_secs),
            reconnection_retries: env::var("REDIS_RECONNECTION_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.reconnection_retries),
            retry_exponent_base: env::var("REDIS_RETRY_EXPONENT_BASE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_exponent_base),
            max_retry_delay_ms: env::var("REDIS_MAX_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retry_delay_ms),
            initial_connection_retries: env::var("REDIS_INITIAL_CONNECTION_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.initial_connection_retries),
            initial_retry_delay_ms: env::var("REDIS_INITIAL_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.initial_retry_delay_ms),
        }
    }
}

/// Media blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Root directory for the disk-backed image store
    pub disk_root: PathBuf,
}

/// Credentials and endpoint for one LLM-backed vision provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionProviderCredentials {
    /// API key; required when this provider is selected
    pub api_key: Option<String>,
    /// Model identifier sent with each request
    pub model: String,
    /// API base URL (override for proxies and compatible endpoints)
    pub api_base: String,
}

/// Vision/LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Selected provider, resolved once at startup
    pub provider: VisionProviderType,
    /// `OpenAI`-style endpoint credentials
    pub openai: VisionProviderCredentials,
    /// Anthropic-style endpoint credentials
    pub anthropic: VisionProviderCredentials,
    /// Caller-side timeout applied to every provider call
    pub request_timeout: Duration,
}

/// Analysis pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Sync (inline) or async (queued) analysis
    pub mode: AnalyzeMode,
    /// Portion estimation strategy
    pub portion_mode: PortionMode,
}

/// Analysis result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum entries held by the in-memory backend
    pub max_entries: usize,
    /// Background cleanup interval for expired entries (memory backend)
    pub cleanup_interval_secs: u64,
    /// TTL applied to stored analysis results
    pub ttl: Duration,
}

/// Job queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name (Redis list key)
    pub name: String,
    /// Number of concurrent workers
    pub worker_concurrency: usize,
    /// Maximum delivery attempts per job
    pub max_attempts: u32,
    /// Initial backoff delay; doubles per attempt
    pub backoff_initial_ms: u64,
}

/// Complete server configuration, constructed once at startup and passed by
/// reference into component constructors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Log level
    pub log_level: LogLevel,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration
    pub redis: RedisConfig,
    /// Media store configuration
    pub media: MediaConfig,
    /// Vision provider configuration
    pub vision: VisionConfig,
    /// Pipeline configuration
    pub analysis: AnalysisConfig,
    /// Result cache configuration
    pub cache: CacheSettings,
    /// Job queue configuration
    pub queue: QueueConfig,
}

/// Default TTL for cached analysis results: 7 days
pub const DEFAULT_IMAGE_CACHE_TTL_SECS: u64 = 604_800;

/// Default provider call timeout in seconds
pub const DEFAULT_VISION_TIMEOUT_SECS: u64 = 20;

/// Default queue name consumed by the worker pool
pub const DEFAULT_QUEUE_NAME: &str = "food:analyze";

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error when a variable fails to parse or validation fails
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let config = Self {
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )?),
            log_level: LogLevel::from_str_or_default(&env_var_or("LOG_LEVEL", "info")?),

            database: DatabaseConfig {
                url: DatabaseUrl::parse_url(&env_var_or(
                    "DATABASE_URL",
                    "sqlite:./data/mealsnap.db",
                )?)
                .unwrap_or_default(),
                auto_migrate: env_var_or("AUTO_MIGRATE", "true")?
                    .parse()
                    .context("Invalid AUTO_MIGRATE value")?,
            },

            redis: RedisConfig {
                url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
                connection: RedisConnectionConfig::from_env(),
            },

            media: MediaConfig {
                disk_root: PathBuf::from(env_var_or("MEDIA_DISK_ROOT", "./var/media")?),
            },

            vision: VisionConfig {
                provider: VisionProviderType::from_env(),
                openai: VisionProviderCredentials {
                    api_key: env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
                    model: env_var_or("OPENAI_MODEL", "gpt-4o")?,
                    api_base: env_var_or("OPENAI_API_BASE", "https://api.openai.com/v1")?,
                },
                anthropic: VisionProviderCredentials {
                    api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|s| !s.is_empty()),
                    model: env_var_or("ANTHROPIC_MODEL", "claude-3-5-sonnet-20241022")?,
                    api_base: env_var_or("ANTHROPIC_API_BASE", "https://api.anthropic.com/v1")?,
                },
                request_timeout: Duration::from_secs(
                    env_var_or("VISION_TIMEOUT_SECS", &DEFAULT_VISION_TIMEOUT_SECS.to_string())?
                        .parse()
                        .context("Invalid VISION_TIMEOUT_SECS value")?,
                ),
            },

            analysis: AnalysisConfig {
                mode: AnalyzeMode::from_env(),
                portion_mode: PortionMode::from_env(),
            },

            cache: CacheSettings {
                max_entries: env_var_or("CACHE_MAX_ENTRIES", "10000")?
                    .parse()
                    .context("Invalid CACHE_MAX_ENTRIES value")?,
                cleanup_interval_secs: env_var_or("CACHE_CLEANUP_INTERVAL_SECS", "60")?
                    .parse()
                    .context("Invalid CACHE_CLEANUP_INTERVAL_SECS value")?,
                ttl: Duration::from_secs(
                    env_var_or("IMAGE_CACHE_TTL_SEC", &DEFAULT_IMAGE_CACHE_TTL_SECS.to_string())?
                        .parse()
                        .context("Invalid IMAGE_CACHE_TTL_SEC value")?,
                ),
            },

            queue: QueueConfig {
                name: env_var_or("FOOD_QUEUE", DEFAULT_QUEUE_NAME)?,
                worker_concurrency: env_var_or("QUEUE_WORKER_CONCURRENCY", "2")?
                    .parse()
                    .context("Invalid QUEUE_WORKER_CONCURRENCY value")?,
                max_attempts: env_var_or("QUEUE_MAX_ATTEMPTS", "3")?
                    .parse()
                    .context("Invalid QUEUE_MAX_ATTEMPTS value")?,
                backoff_initial_ms: env_var_or("QUEUE_BACKOFF_MS", "3000")?
                    .parse()
                    .context("Invalid QUEUE_BACKOFF_MS value")?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration consistency
    ///
    /// # Errors
    ///
    /// Returns an error for unusable combinations (selected provider without
    /// credentials, zero workers, zero attempts)
    pub fn validate(&self) -> Result<()> {
        match self.vision.provider {
            VisionProviderType::OpenAi if self.vision.openai.api_key.is_none() => {
                return Err(anyhow::anyhow!(
                    "OPENAI_API_KEY is required when ANALYZER_PROVIDER=openai"
                ));
            }
            VisionProviderType::Anthropic if self.vision.anthropic.api_key.is_none() => {
                return Err(anyhow::anyhow!(
                    "ANTHROPIC_API_KEY is required when ANALYZER_PROVIDER=anthropic"
                ));
            }
            _ => {}
        }

        // LLM portioning needs an OpenAI-style endpoint; rule mode does not
        if self.analysis.portion_mode == PortionMode::Llm
            && self.vision.provider != VisionProviderType::Demo
            && self.vision.openai.api_key.is_none()
            && self.vision.anthropic.api_key.is_none()
        {
            warn!("LLM portion mode selected without any provider credentials; estimates will fall back to rules");
        }

        if self.queue.worker_concurrency == 0 {
            return Err(anyhow::anyhow!("QUEUE_WORKER_CONCURRENCY must be at least 1"));
        }

        if self.queue.max_attempts == 0 {
            return Err(anyhow::anyhow!("QUEUE_MAX_ATTEMPTS must be at least 1"));
        }

        if self.cache.ttl.as_secs() == 0 {
            warn!("IMAGE_CACHE_TTL_SEC is 0; analysis results will not be cached");
        }

        Ok(())
    }

    /// Human-readable configuration summary for startup logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Mealsnap Analysis Core Configuration:\n\
             - Environment: {}\n\
             - Log Level: {}\n\
             - Database: {}\n\
             - Redis: {}\n\
             - Vision Provider: {}\n\
             - Analyze Mode: {}\n\
             - Portion Mode: {}\n\
             - Cache TTL: {}s\n\
             - Queue: {} ({} workers, {} attempts)",
            self.environment,
            self.log_level,
            self.database.url,
            if self.redis.url.is_some() {
                "configured"
            } else {
                "in-memory fallback"
            },
            self.vision.provider,
            self.analysis.mode,
            self.analysis.portion_mode,
            self.cache.ttl.as_secs(),
            self.queue.name,
            self.queue.worker_concurrency,
            self.queue.max_attempts,
        )
    }
}

/// Read an environment variable with a default fallback
fn env_var_or(key: &str, default: &str) -> Result<String> {
    Ok(env::var(key).unwrap_or_else(|_| default.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_roundtrip() {
        let url = DatabaseUrl::parse_url("sqlite:./data/test.db").unwrap();
        assert_eq!(url.to_connection_string(), "sqlite:./data/test.db");
        assert!(!url.is_memory());

        let mem = DatabaseUrl::parse_url("sqlite::memory:").unwrap();
        assert!(mem.is_memory());
        assert_eq!(mem.to_connection_string(), "sqlite::memory:");
    }

    #[test]
    fn bare_path_is_treated_as_sqlite() {
        let url = DatabaseUrl::parse_url("./data/test.db").unwrap();
        assert_eq!(url.to_connection_string(), "sqlite:./data/test.db");
    }
}
