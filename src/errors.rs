// ABOUTME: Unified error handling system with stable error codes and HTTP mapping
// ABOUTME: Defines AppError, ErrorCode, AppResult and the wire-level ErrorResponse shape
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! Error codes and the unified [`AppError`] type used across the analysis
//! core. Codes are stable wire constants; the HTTP status mapping lets the
//! collaborating API layer surface pipeline failures without interpreting
//! message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // 3xxx validation
    /// Provided input is invalid
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,
    /// A required field is missing
    #[serde(rename = "MISSING_REQUIRED_FIELD")]
    MissingRequiredField = 3001,
    /// Data format is invalid (e.g. malformed provider JSON)
    #[serde(rename = "INVALID_FORMAT")]
    InvalidFormat = 3002,
    /// Value outside the acceptable range
    #[serde(rename = "VALUE_OUT_OF_RANGE")]
    ValueOutOfRange = 3003,

    // 4xxx resource lookup
    /// Requested resource does not exist
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,
    /// Resource with this identifier already exists
    #[serde(rename = "RESOURCE_ALREADY_EXISTS")]
    ResourceAlreadyExists = 4001,
    /// Resource temporarily unavailable
    #[serde(rename = "RESOURCE_UNAVAILABLE")]
    ResourceUnavailable = 4002,

    // 5xxx vision/LLM providers
    /// Vision/LLM provider returned an error
    #[serde(rename = "EXTERNAL_SERVICE_ERROR")]
    ExternalServiceError = 5000,
    /// Vision/LLM provider is unreachable
    #[serde(rename = "EXTERNAL_SERVICE_UNAVAILABLE")]
    ExternalServiceUnavailable = 5001,
    /// Provider rejected our credentials
    #[serde(rename = "EXTERNAL_AUTH_FAILED")]
    ExternalAuthFailed = 5002,
    /// Provider rate limit hit
    #[serde(rename = "EXTERNAL_RATE_LIMITED")]
    ExternalRateLimited = 5003,

    // 6xxx configuration
    /// Configuration error encountered
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 6000,
    /// Required configuration is missing
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing = 6001,
    /// Configuration is invalid
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6002,

    // 7xxx analysis pipeline
    /// The extractor found no food in the image
    #[serde(rename = "NO_FOOD_DETECTED")]
    NoFoodDetected = 7000,
    /// The analysis pipeline failed; the meal is terminalized as failed
    #[serde(rename = "ANALYSIS_FAILED")]
    AnalysisFailed = 7001,

    // 9xxx internal
    /// Unclassified internal error
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    /// Database operation failed
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
    /// Cache or blob storage operation failed
    #[serde(rename = "STORAGE_ERROR")]
    StorageError = 9002,
    /// Serialization or deserialization failed
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9003,
    /// Job queue operation failed
    #[serde(rename = "QUEUE_ERROR")]
    QueueError = 9004,
}

impl ErrorCode {
    /// HTTP status the collaborating API layer should answer with
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput
            | Self::MissingRequiredField
            | Self::InvalidFormat
            | Self::ValueOutOfRange => 400,
            Self::ResourceNotFound => 404,
            Self::ResourceAlreadyExists => 409,
            // Readable image, unanalyzable content
            Self::NoFoodDetected | Self::AnalysisFailed => 422,
            Self::ExternalServiceError | Self::ExternalServiceUnavailable => 502,
            Self::ResourceUnavailable | Self::ExternalAuthFailed | Self::ExternalRateLimited => 503,
            Self::ConfigError | Self::ConfigMissing | Self::ConfigInvalid => 500,
            Self::InternalError
            | Self::DatabaseError
            | Self::StorageError
            | Self::SerializationError
            | Self::QueueError => 500,
        }
    }

    /// Short human-readable text for the code, independent of any message
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Provided input failed validation",
            Self::MissingRequiredField => "A required field was missing",
            Self::InvalidFormat => "Payload was malformed",
            Self::ValueOutOfRange => "Value was outside the accepted range",
            Self::ResourceNotFound => "Requested resource does not exist",
            Self::ResourceAlreadyExists => "Resource identifier already in use",
            Self::ResourceUnavailable => "Resource is temporarily unavailable",
            Self::ExternalServiceError => "Upstream provider returned an error",
            Self::ExternalServiceUnavailable => "Upstream provider is unreachable",
            Self::ExternalAuthFailed => "Upstream provider rejected our credentials",
            Self::ExternalRateLimited => "Upstream provider rate limit hit",
            Self::ConfigError => "Configuration problem",
            Self::ConfigMissing => "Required configuration is not set",
            Self::ConfigInvalid => "Configuration value is invalid",
            Self::NoFoodDetected => "No food items were detected in the image",
            Self::AnalysisFailed => "Meal analysis did not complete",
            Self::InternalError => "Internal error",
            Self::DatabaseError => "Database query failed",
            Self::StorageError => "Cache or blob storage failed",
            Self::SerializationError => "Serialization failed",
            Self::QueueError => "Queue operation failed",
        }
    }
}

/// Context carried alongside an error for tracing and audit trails
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Request ID when the error originated inside a traced request
    pub request_id: Option<String>,
    /// Owner of the resource being operated on, when known
    pub user_id: Option<Uuid>,
    /// Meal, asset, or canonical ID the error refers to
    pub resource_id: Option<String>,
    /// Free-form structured detail, `Null` when absent
    pub details: serde_json::Value,
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Stable machine-readable code
    pub code: ErrorCode,
    /// Text safe to show to a caller
    pub message: String,
    /// Tracing and audit context
    pub context: ErrorContext,
    /// Underlying cause, when captured
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Resource not found; `resource` names what was looked up
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Request input failed validation
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Invalid data format (malformed provider response, bad JSON)
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFormat, message)
    }

    /// Unclassified internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Cache or blob storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Bad or missing configuration
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Job queue error
    pub fn queue(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::QueueError, message)
    }

    /// External service error, prefixed with the provider name
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// External service authentication failure
    pub fn external_auth(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalAuthFailed,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// External service rate limit hit
    pub fn rate_limited(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalRateLimited,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// No food detected in the analyzed image
    pub fn no_food_detected() -> Self {
        Self::new(ErrorCode::NoFoodDetected, "No food items detected in image")
    }

    /// Attach a request ID
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context.request_id = Some(request_id.into());
        self
    }

    /// Attach the owning user
    #[must_use]
    pub const fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.context.user_id = Some(user_id);
        self
    }

    /// Attach the ID of the resource involved
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.context.resource_id = Some(resource_id.into());
        self
    }

    /// Attach structured detail
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.context.details = details;
        self
    }

    /// Attach the underlying cause for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// HTTP status for this error's code
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Envelope the collaborating API layer serializes error answers into
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorDetail,
}

/// Body of the HTTP error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Request ID when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Structured context details
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorDetail {
                code: error.code,
                message: error.message,
                request_id: error.context.request_id,
                details: error.context.details,
            },
        }
    }
}

/// Conversion from `anyhow::Error` (database and config boundaries)
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        let converted = Self::new(ErrorCode::InternalError, error.to_string());
        // Keep the root cause visible in the structured detail
        match error.source() {
            Some(cause) => {
                converted.with_details(serde_json::json!({ "cause": cause.to_string() }))
            }
            None => converted,
        }
    }
}

/// Conversion from `serde_json::Error`
impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, error.to_string())
    }
}
