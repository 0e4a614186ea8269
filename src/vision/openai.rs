// ABOUTME: OpenAI-style vision provider using the chat completions endpoint
// ABOUTME: Sends base64 JPEG image_url payloads and requests JSON-mode responses

//! # `OpenAI`-Style Vision Provider
//!
//! Implementation of the `VisionProvider` trait against an `OpenAI`-compatible
//! chat completions endpoint.
//!
//! ## Configuration
//!
//! - `OPENAI_API_KEY`: API key, required when `ANALYZER_PROVIDER=openai`
//! - `OPENAI_MODEL`: model identifier (default `gpt-4o`)
//! - `OPENAI_API_BASE`: endpoint base URL, overridable for proxies and
//!   compatible servers

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

/// Maximum completion tokens for a label extraction call
const LABEL_MAX_TOKENS: u32 = 1000;

/// Maximum completion tokens for a portion estimation call
const PORTION_MAX_TOKENS: u32 = 800;

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Chat completions request structure
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

/// Message structure for the chat completions endpoint
#[derive(Debug, Serialize)]
struct ChatCompletionMessage {
    role: &'static str,
    content: MessageContent,
}

/// Message content: plain text for system turns, parts for the image turn
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part user message
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

/// Image payload carried as a base64 data URL
#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// JSON-mode response format selector
#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// Chat completions response structure
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

/// Choice in the chat completions response
#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
}

/// Message in the chat completions response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
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

/// Vision provider backed by an `OpenAI`-style chat completions endpoint
#[derive(Debug)]
pub struct OpenAiVisionProvider {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl OpenAiVisionProvider {
    /// Create a provider from resolved credentials
    ///
    /// # Errors
    ///
    /// Returns an error when no API key is configured or the HTTP client
    /// cannot be built.
    pub fn new(credentials: &VisionProviderCredentials, timeout: Duration) -> AppResult<Self> {
        let api_key = credentials.api_key.clone().ok_or_else(|| {
            AppError::config("OPENAI_API_KEY is required when the OpenAI provider is selected")
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

    /// Encode image bytes as an `image_url` content part
    fn image_part(image: &[u8]) -> ContentPart {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!(
                    "data:image/jpeg;base64,{}",
                    general_purpose::STANDARD.encode(image)
                ),
            },
        }
    }

    /// Send a JSON-mode completion request and return the message content
    async fn complete_json(
        &self,
        messages: Vec<ChatCompletionMessage>,
        max_tokens: u32,
    ) -> AppResult<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            temperature: 0.0,
            max_tokens,
        };

        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to OpenAI API: {}", e);
                AppError::external_service("openai", format!("Failed to connect: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read OpenAI API response: {}", e);
            AppError::external_service("openai", format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse OpenAI API response: {}", e);
            AppError::external_service("openai", format!("Failed to parse response: {e}"))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::external_service("openai", "API returned no content"))
    }

    /// Parse an error response body into a typed `AppError`
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(body) {
            let error_type = error_response
                .error
                .error_type
                .unwrap_or_else(|| "unknown".to_owned());

            match status.as_u16() {
                401 => AppError::external_auth("openai", error_response.error.message),
                429 => AppError::rate_limited("openai", error_response.error.message),
                400 => AppError::invalid_input(format!(
                    "OpenAI API validation error: {}",
                    error_response.error.message
                )),
                _ => AppError::external_service(
                    "openai",
                    format!("{} - {}", error_type, error_response.error.message),
                ),
            }
        } else {
            AppError::external_service(
                "openai",
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
impl VisionProvider for OpenAiVisionProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn display_name(&self) -> &'static str {
        "OpenAI-style chat completions"
    }

    #[instrument(skip(self, image), fields(model = %self.model, image_bytes = image.len()))]
    async fn extract_labels(&self, image: &[u8]) -> AppResult<Vec<Label>> {
        debug!("Extracting labels via OpenAI-style endpoint");

        let messages = vec![
            ChatCompletionMessage {
                role: "system",
                content: MessageContent::Text(LABEL_INSTRUCTION.to_owned()),
            },
            ChatCompletionMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: LABEL_REQUEST.to_owned(),
                    },
                    Self::image_part(image),
                ]),
            },
        ];

        let content = self.complete_json(messages, LABEL_MAX_TOKENS).await?;
        let labels = parse_label_payload(self.name(), &content)?;

        debug!("Extracted {} labels", labels.len());
        Ok(labels)
    }

    #[instrument(skip(self, image, labels), fields(model = %self.model, label_count = labels.len()))]
    async fn portion_hints(&self, image: &[u8], labels: &[Label]) -> AppResult<Vec<PortionHint>> {
        debug!("Requesting portion hints via OpenAI-style endpoint");

        let messages = vec![
            ChatCompletionMessage {
                role: "system",
                content: MessageContent::Text(PORTION_INSTRUCTION.to_owned()),
            },
            ChatCompletionMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: portion_request_text(labels),
                    },
                    Self::image_part(image),
                ]),
            },
        ];

        let content = self.complete_json(messages, PORTION_MAX_TOKENS).await?;
        parse_portion_payload(self.name(), &content)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> AppResult<bool> {
        debug!("Performing OpenAI API health check");

        // The models endpoint is a lightweight credential check
        let response = self
            .client
            .get(self.api_url("models"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI health check failed: {}", e);
                AppError::external_service("openai", format!("Health check failed: {e}"))
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
            model: "gpt-4o".to_owned(),
            api_base: "https://api.openai.com/v1/".to_owned(),
        }
    }

    #[test]
    fn new_requires_api_key() {
        let err =
            OpenAiVisionProvider::new(&credentials(None), Duration::from_secs(20)).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::ConfigError);
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let provider =
            OpenAiVisionProvider::new(&credentials(Some("sk-test")), Duration::from_secs(20))
                .unwrap();
        assert_eq!(
            provider.api_url("chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn image_part_serializes_as_data_url() {
        let part = OpenAiVisionProvider::image_part(&[1, 2, 3]);
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "image_url");
        let url = json["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn error_response_maps_auth_and_rate_limit_statuses() {
        let body = r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#;

        let err = OpenAiVisionProvider::parse_error_response(
            reqwest::StatusCode::UNAUTHORIZED,
            body,
        );
        assert_eq!(err.code, crate::errors::ErrorCode::ExternalAuthFailed);

        let err = OpenAiVisionProvider::parse_error_response(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            body,
        );
        assert_eq!(err.code, crate::errors::ErrorCode::ExternalRateLimited);
    }

    #[test]
    fn unparseable_error_body_is_truncated_external_error() {
        let err = OpenAiVisionProvider::parse_error_response(
            reqwest::StatusCode::BAD_GATEWAY,
            &"x".repeat(500),
        );
        assert_eq!(err.code, crate::errors::ErrorCode::ExternalServiceError);
        assert!(err.message.len() < 300);
    }
}
