// ABOUTME: Anthropic-style vision provider using the messages endpoint
// ABOUTME: Sends base64 image source blocks in a single user turn and parses text responses

//! # Anthropic-Style Vision Provider
//!
//! Implementation of the `VisionProvider` trait against an Anthropic-style
//! messages endpoint. The endpoint takes instructions inline in the user turn,
//! so the shared instruction text and the request line are concatenated into
//! one text block ahead of the image.
//!
//! ## Configuration
//!
//! - `ANTHROPIC_API_KEY`: API key, required when `ANALYZER_PROVIDER=anthropic`
//! - `ANTHROPIC_MODEL`: model identifier (default `claude-3-5-sonnet-20241022`)
//! - `ANTHROPIC_API_BASE`: endpoint base URL, overridable for proxies

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};

use super::prompts::{portion_request_text, LABEL_INSTRUCTION, LABEL_REQUEST, PORTION_INSTRUCTION};
use super::{parse_label_payload, parse_portion_payload, PortionHint, VisionProvider};
use crate::config::VisionProviderCredentials;
use crate::errors::{AppError, AppResult};
use crate::models::Label;

/// Protocol version header required by the messages endpoint
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Maximum completion tokens for a label extraction call
const LABEL_MAX_TOKENS: u32 = 1000;

/// Maximum completion tokens for a portion estimation call
const PORTION_MAX_TOKENS: u32 = 800;

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Messages request structure
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<MessagesMessage>,
}

/// Message structure for the messages endpoint
#[derive(Debug, Serialize)]
struct MessagesMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

/// One content block in a message
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
}

/// Base64 image source block
#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'static str,
    data: String,
}

/// Messages response structure
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
}

/// Content block in the messages response
#[derive(Debug, Deserialize)]
struct ResponseContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// API error response
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

/// Error detail structure
#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Vision provider backed by an Anthropic-style messages endpoint
#[derive(Debug)]
pub struct AnthropicVisionProvider {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl AnthropicVisionProvider {
    /// Create a provider from resolved credentials
    ///
    /// # Errors
    ///
    /// Returns an error when no API key is configured or the HTTP client
    /// cannot be built.
    pub fn new(credentials: &VisionProviderCredentials, timeout: Duration) -> AppResult<Self> {
        let api_key = credentials.api_key.clone().ok_or_else(|| {
            AppError::config("ANTHROPIC_API_KEY is required when the Anthropic provider is selected")
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: credentials.model.clone(),
            api_base: credentials.api_base.trim_end_matches('/').to_owned(),
        })
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.api_base)
    }

    /// Encode image bytes as a base64 source block
    fn image_block(image: &[u8]) -> ContentBlock {
        ContentBlock::Image {
            source: ImageSource {
                source_type: "base64",
                media_type: "image/jpeg",
                data: general_purpose::STANDARD.encode(image),
            },
        }
    }

    /// Send a single-turn request and return the first text block
    ///
    /// Falls back to an empty JSON object when the response carries no text,
    /// which downstream parsing treats as zero items.
    async fn complete_json(
        &self,
        text: String,
        image: &[u8],
        max_tokens: u32,
    ) -> AppResult<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens,
            temperature: 0.0,
            messages: vec![MessagesMessage {
                role: "user",
                content: vec![ContentBlock::Text { text }, Self::image_block(image)],
            }],
        };

        let response = self
            .client
            .post(self.api_url("messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to Anthropic API: {}", e);
                AppError::external_service("anthropic", format!("Failed to connect: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read Anthropic API response: {}", e);
            AppError::external_service("anthropic", format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let messages: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse Anthropic API response: {}", e);
            AppError::external_service("anthropic", format!("Failed to parse response: {e}"))
        })?;

        Ok(messages
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .unwrap_or_else(|| "{}".to_owned()))
    }

    /// Parse an error response body into a typed `AppError`
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(body) {
            let error_type = error_response
                .error
                .error_type
                .unwrap_or_else(|| "unknown".to_owned());

            match status.as_u16() {
                401 => AppError::external_auth("anthropic", error_response.error.message),
                429 => AppError::rate_limited("anthropic", error_response.error.message),
                400 => AppError::invalid_input(format!(
                    "Anthropic API validation error: {}",
                    error_response.error.message
                )),
                _ => AppError::external_service(
                    "anthropic",
                    format!("{} - {}", error_type, error_response.error.message),
                ),
            }
        } else {
            AppError::external_service(
                "anthropic",
                format!(
                    "API error ({}): {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            )
        }
    }
}

#[async_trait]
impl VisionProvider for AnthropicVisionProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn display_name(&self) -> &'static str {
        "Anthropic-style messages"
    }

    #[instrument(skip(self, image), fields(model = %self.model, image_bytes = image.len()))]
    async fn extract_labels(&self, image: &[u8]) -> AppResult<Vec<Label>> {
        debug!("Extracting labels via Anthropic-style endpoint");

        let text = format!("{LABEL_INSTRUCTION}\n{LABEL_REQUEST}");
        let content = self.complete_json(text, image, LABEL_MAX_TOKENS).await?;
        let labels = parse_label_payload(self.name(), &content)?;

        debug!("Extracted {} labels", labels.len());
        Ok(labels)
    }

    #[instrument(skip(self, image, labels), fields(model = %self.model, label_count = labels.len()))]
    async fn portion_hints(&self, image: &[u8], labels: &[Label]) -> AppResult<Vec<PortionHint>> {
        debug!("Requesting portion hints via Anthropic-style endpoint");

        let text = format!("{PORTION_INSTRUCTION}\n{}", portion_request_text(labels));
        let content = self.complete_json(text, image, PORTION_MAX_TOKENS).await?;
        parse_portion_payload(self.name(), &content)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> AppResult<bool> {
        debug!("Performing Anthropic API health check");

        let response = self
            .client
            .get(self.api_url("models"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(|e| {
                error!("Anthropic health check failed: {}", e);
                AppError::external_service("anthropic", format!("Health check failed: {e}"))
            })?;

        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(api_key: Option<&str>) -> VisionProviderCredentials {
        VisionProviderCredentials {
            api_key: api_key.map(str::to_owned),
            model: "claude-3-5-sonnet-20241022".to_owned(),
            api_base: "https://api.anthropic.com/v1".to_owned(),
        }
    }

    #[test]
    fn new_requires_api_key() {
        let err =
            AnthropicVisionProvider::new(&credentials(None), Duration::from_secs(20)).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::ConfigError);
    }

    #[test]
    fn image_block_serializes_as_base64_source() {
        let block = AnthropicVisionProvider::image_block(&[1, 2, 3]);
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["source"]["type"], "base64");
        assert_eq!(json["source"]["media_type"], "image/jpeg");
        assert!(!json["source"]["data"].as_str().unwrap().is_empty());
    }

    #[test]
    fn error_response_maps_statuses() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;

        let err = AnthropicVisionProvider::parse_error_response(
            reqwest::StatusCode::UNAUTHORIZED,
            body,
        );
        assert_eq!(err.code, crate::errors::ErrorCode::ExternalAuthFailed);

        let err = AnthropicVisionProvider::parse_error_response(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            body,
        );
        assert_eq!(err.code, crate::errors::ErrorCode::ExternalRateLimited);
    }
}
