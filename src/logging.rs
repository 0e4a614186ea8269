// ABOUTME: Tracing subscriber setup plus structured log helpers for the analysis pipeline
// ABOUTME: Level and format come from the environment; noisy dependencies are filtered down
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! Subscriber wiring and the structured log lines the pipeline emits

use anyhow::Result;
use serde_json::json;
use std::env;
use tracing::info;

use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LogLevel;

/// Dependency targets that are too chatty at the application level
const QUIET_DIRECTIVES: &[&str] = &[
    "hyper=warn",
    "hyper::proto=warn",
    "reqwest=warn",
    "sqlx=info",
    "sqlx::query=info",
    "redis=warn",
];

/// Settings the subscriber is built from
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level that is emitted
    pub level: String,
    /// Rendering of emitted lines
    pub format: LogFormat,
    /// Emit source file and line numbers
    pub include_location: bool,
    /// Emit thread ids and names
    pub include_thread: bool,
    /// Emit span enter/close events
    pub include_spans: bool,
    /// Service name reported in the startup line
    pub service_name: String,
    /// Service version reported in the startup line
    pub service_version: String,
    /// Deployment environment (development, staging, production)
    pub environment: String,
}

/// How log lines are rendered
#[derive(Debug, Clone)]
pub enum LogFormat {
    /// One `JSON` object per line, for log shippers
    Json,
    /// Multi-line human-readable output for development
    Pretty,
    /// Single terse line, for cramped terminals
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            include_location: false,
            include_thread: false,
            include_spans: false,
            service_name: "mealsnap-core".into(),
            service_version: env!("CARGO_PKG_VERSION").to_owned(),
            environment: "development".into(),
        }
    }
}

impl LoggingConfig {
    /// Create logging configuration from environment variables.
    ///
    /// `RUST_LOG` wins when set; otherwise `LOG_LEVEL` is sanitized through
    /// [`LogLevel`] so junk values degrade to `info` instead of silencing the
    /// subscriber. Production defaults to location/thread/span detail.
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| {
            LogLevel::from_str_or_default(&env::var("LOG_LEVEL").unwrap_or_default()).to_string()
        });

        let format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let is_production = environment == "production";

        Self {
            level,
            format,
            include_location: is_production || env::var("LOG_INCLUDE_LOCATION").is_ok(),
            include_thread: is_production || env::var("LOG_INCLUDE_THREAD").is_ok(),
            include_spans: is_production || env::var("LOG_INCLUDE_SPANS").is_ok(),
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "mealsnap-core".into()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_owned()),
            environment,
        }
    }

    /// Install the global tracing subscriber described by these settings
    ///
    /// # Errors
    ///
    /// A subscriber was already installed, or layer setup failed
    pub fn init(&self) -> Result<()> {
        let registry = tracing_subscriber::registry().with(self.build_filter());

        match self.format {
            LogFormat::Json => registry.with(self.text_layer().json()).init(),
            LogFormat::Pretty => registry.with(self.text_layer()).init(),
            LogFormat::Compact => {
                let layer = fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_span_events(FmtSpan::NONE);
                registry.with(layer).init();
            }
        }

        self.log_startup();
        Ok(())
    }

    /// Shared fmt layer settings for the text-ish formats; stdout is the
    /// default writer so none is set here
    fn text_layer<S>(&self) -> fmt::Layer<S> {
        fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_thread_ids(self.include_thread)
            .with_thread_names(self.include_thread)
            .with_target(true)
            .with_span_events(self.span_events())
    }

    /// Level filter for the subscriber: `RUST_LOG` verbatim when set, the
    /// configured level otherwise, with the quiet-dependency directives and
    /// the crate's own level applied on top
    fn build_filter(&self) -> EnvFilter {
        let mut filter = env::var("RUST_LOG")
            .map_or_else(|_| EnvFilter::new(&self.level), EnvFilter::new);

        for directive in QUIET_DIRECTIVES {
            if let Ok(parsed) = directive.parse::<Directive>() {
                filter = filter.add_directive(parsed);
            }
        }

        filter.add_directive(
            format!("mealsnap={}", self.level)
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        )
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// One structured line plus a JSON summary of the effective settings
    fn log_startup(&self) {
        info!(
            service.name = %self.service_name,
            service.version = %self.service_version,
            environment = %self.environment,
            log.level = %self.level,
            log.format = ?self.format,
            "Mealsnap analysis core starting up"
        );

        let summary = json!({
            "service": self.service_name,
            "version": self.service_version,
            "environment": self.environment,
            "logging": {
                "level": self.level,
                "format": format!("{:?}", self.format),
                "location": self.include_location,
                "thread": self.include_thread,
                "spans": self.include_spans,
            },
        });
        info!("Logging configured: {summary}");
    }
}

/// Read the environment and install the subscriber in one step
///
/// # Errors
///
/// Subscriber installation failed
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}

/// Canonical structured log lines for pipeline events
pub struct AppLogger;

impl AppLogger {
    /// Log one analysis pipeline run
    pub fn log_analysis(meal_id: &str, outcome: &str, cache_hit: bool, duration_ms: u64) {
        info!(
            meal.id = %meal_id,
            analysis.outcome = %outcome,
            analysis.cache_hit = %cache_hit,
            analysis.duration_ms = %duration_ms,
            "Meal analysis"
        );
    }

    /// Log outbound vision/LLM provider calls
    pub fn log_provider_call(provider: &str, operation: &str, success: bool, duration_ms: u64) {
        info!(
            provider.name = %provider,
            provider.operation = %operation,
            provider.success = %success,
            provider.duration_ms = %duration_ms,
            "Vision provider call"
        );
    }

    /// Log job queue activity
    pub fn log_queue_event(queue: &str, event: &str, meal_id: &str, attempt: u32) {
        info!(
            queue.name = %queue,
            queue.event = %event,
            meal.id = %meal_id,
            queue.attempt = %attempt,
            "Queue event"
        );
    }
}
