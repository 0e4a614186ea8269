// ABOUTME: Core configuration type definitions for environment and pipeline settings
// ABOUTME: Contains LogLevel, Environment, VisionProviderType, PortionMode and AnalyzeMode enums
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Strongly typed log level
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Failures only
    Error,
    /// Failures plus suspicious conditions
    Warn,
    /// Operational messages (default)
    #[default]
    Info,
    /// Verbose troubleshooting detail
    Debug,
    /// Extremely verbose tracing
    Trace,
}

impl LogLevel {
    /// Lenient parse; unrecognized input degrades to `Info`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "error" => Self::Error,
            "warn" | "warning" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info, // anything else, including "info"
        }
    }

    /// Canonical lowercase name, understood by `RUST_LOG`
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Deployment environment the process believes it is running in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development (default)
    #[default]
    Development,
    /// Deployed production
    Production,
    /// Automated test runs
    Testing,
}

impl Environment {
    /// Lenient parse; unrecognized input degrades to `Development`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development, // anything else, including "development" and "dev"
        }
    }

    /// True when running in a deployed production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Vision provider selection for label extraction and portion estimation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisionProviderType {
    /// Demo provider - fixed stub labels, no external calls (default)
    #[default]
    Demo,
    /// `OpenAI`-style chat completions endpoint with `image_url` payloads
    OpenAi,
    /// Anthropic-style messages endpoint with base64 image blocks
    Anthropic,
}

impl VisionProviderType {
    /// Environment variable that selects the provider
    pub const ENV_VAR: &'static str = "ANALYZER_PROVIDER";

    /// Lenient parse; unrecognized input degrades to `Demo`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "openai-like" | "gpt" => Self::OpenAi,
            "anthropic" | "anthropic-like" | "claude" => Self::Anthropic,
            _ => Self::Demo, // anything else, including "demo"
        }
    }

    /// Read [`Self::ENV_VAR`], falling back to the default when unset
    #[must_use]
    pub fn from_env() -> Self {
        env::var(Self::ENV_VAR)
            .map(|s| Self::from_str_or_default(&s))
            .unwrap_or_default()
    }

    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl Display for VisionProviderType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Portion estimation strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortionMode {
    /// LLM-backed estimation with rule fallback (default)
    #[default]
    Llm,
    /// Rule-based estimation only, no external calls
    Rule,
}

impl PortionMode {
    /// Environment variable that selects the portion strategy
    pub const ENV_VAR: &'static str = "AI_PORTION_PROVIDER";

    /// Lenient parse; unrecognized input degrades to `Llm`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "rule" | "rules" => Self::Rule,
            _ => Self::Llm, // anything else, including "llm"
        }
    }

    /// Read [`Self::ENV_VAR`], falling back to the default when unset
    #[must_use]
    pub fn from_env() -> Self {
        env::var(Self::ENV_VAR)
            .map(|s| Self::from_str_or_default(&s))
            .unwrap_or_default()
    }

    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Rule => "rule",
        }
    }
}

impl Display for PortionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Whether uploads are analyzed inline or through the job queue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeMode {
    /// Analyze inline on the request path (default)
    #[default]
    Sync,
    /// Enqueue an analysis job for the worker pool
    Async,
}

impl AnalyzeMode {
    /// Environment variable that selects the mode
    pub const ENV_VAR: &'static str = "ANALYZE_MODE";

    /// Lenient parse; unrecognized input degrades to `Sync`
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "async" | "queue" | "queued" => Self::Async,
            _ => Self::Sync, // anything else, including "sync"
        }
    }

    /// Read [`Self::ENV_VAR`], falling back to the default when unset
    #[must_use]
    pub fn from_env() -> Self {
        env::var(Self::ENV_VAR)
            .map(|s| Self::from_str_or_default(&s))
            .unwrap_or_default()
    }

    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
        }
    }
}

impl Display for AnalyzeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
