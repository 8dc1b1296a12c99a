// ABOUTME: Groq LLM provider implementation
// ABOUTME: Secondary text provider using Groq's OpenAI-compatible chat completions API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Groq Provider
//!
//! Implementation of the `LlmProvider` trait for Groq's hosted open models.
//!
//! ## Configuration
//!
//! Set `GROQ_API_KEY` with a key from the Groq console. The model defaults to
//! `llama-3.3-70b-versatile` and can be overridden with `SOFIA_SECONDARY_MODEL`.
//! Groq is text-only: images attached to a request are rejected.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use super::{ChatMessage, ChatRequest, ChatResponse, LlmCapabilities, LlmProvider, TokenUsage};
use crate::errors::AppError;

/// Default model to use
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Base URL for the Groq API (OpenAI-compatible)
const API_BASE_URL: &str = "https://api.groq.com/openai/v1";

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

#[derive(Debug, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GroqMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for GroqMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
    #[serde(default)]
    usage: Option<GroqUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqUsage {
    #[serde(rename = "prompt_tokens")]
    prompt: u32,
    #[serde(rename = "completion_tokens")]
    completion: u32,
    #[serde(rename = "total_tokens")]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct GroqErrorResponse {
    error: GroqErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GroqErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Groq LLM provider
pub struct GroqProvider {
    client: Client,
    api_key: String,
    default_model: String,
}

impl GroqProvider {
    /// Create a new Groq provider with the given API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            default_model: DEFAULT_MODEL.to_owned(),
        }
    }

    /// Set a custom default model
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn api_url(endpoint: &str) -> String {
        format!("{API_BASE_URL}/{endpoint}")
    }

    fn build_groq_request(&self, request: &ChatRequest) -> GroqRequest {
        GroqRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages: request.messages.iter().map(GroqMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }

    /// Parse error response from Groq API
    fn parse_error_response(status: StatusCode, body: &str) -> AppError {
        let Ok(error_response) = serde_json::from_str::<GroqErrorResponse>(body) else {
            return AppError::external_service(
                "groq",
                format!(
                    "API error ({status}): {}",
                    body.chars().take(200).collect::<String>()
                ),
            );
        };

        let message = error_response.error.message;
        match status.as_u16() {
            401 | 403 => AppError::external_auth_failed("groq", message),
            429 => AppError::external_rate_limited("groq", format!("Rate limit exceeded: {message}")),
            500..=599 => AppError::external_unavailable("groq", message),
            _ => {
                let error_type = error_response
                    .error
                    .error_type
                    .unwrap_or_else(|| "unknown".to_owned());
                AppError::external_service("groq", format!("{error_type} - {message}"))
            }
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn display_name(&self) -> &'static str {
        "Groq (Llama)"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.default_model)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        if request.has_images() {
            return Err(AppError::invalid_input("Groq does not accept image input"));
        }

        debug!("Sending chat completion request to Groq");

        let groq_request = self.build_groq_request(request);

        let response = self
            .client
            .post(Self::api_url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&groq_request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to Groq API");
                AppError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let groq_response: GroqResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse Groq API response");
            AppError::external_service("groq", format!("Failed to parse response: {e}"))
        })?;

        let choice = groq_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service("groq", "API returned no choices"))?;

        let content = choice.message.content.unwrap_or_default();

        debug!(
            chars = content.len(),
            finish_reason = ?choice.finish_reason,
            "Received response from Groq"
        );

        Ok(ChatResponse {
            content,
            model: groq_response.model,
            usage: groq_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt,
                completion_tokens: u.completion,
                total_tokens: u.total,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        let response = self
            .client
            .get(Self::api_url("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let healthy = response.status().is_success();
        if !healthy {
            warn!(status = %response.status(), "Groq API health check failed");
        }
        Ok(healthy)
    }
}

impl std::fmt::Debug for GroqProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqProvider")
            .field("default_model", &self.default_model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_request_uses_default_model() {
        let provider = GroqProvider::new("key").with_default_model("llama-3.1-8b-instant");
        let request = ChatRequest::new(vec![ChatMessage::system("sys"), ChatMessage::user("hi")])
            .with_temperature(0.2);
        let body = serde_json::to_value(provider.build_groq_request(&request)).unwrap();

        assert_eq!(body["model"], "llama-3.1-8b-instant");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["stream"], false);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_error_mapping() {
        let body = r#"{"error":{"message":"slow down","type":"rate_limit"}}"#;
        assert_eq!(
            GroqProvider::parse_error_response(StatusCode::TOO_MANY_REQUESTS, body).code,
            ErrorCode::ExternalRateLimited
        );
        assert_eq!(
            GroqProvider::parse_error_response(StatusCode::UNAUTHORIZED, body).code,
            ErrorCode::ExternalAuthFailed
        );
        assert_eq!(
            GroqProvider::parse_error_response(StatusCode::BAD_GATEWAY, "<html>").code,
            ErrorCode::ExternalServiceError
        );
    }

    #[tokio::test]
    async fn test_rejects_images() {
        let provider = GroqProvider::new("key");
        let request = ChatRequest::new(vec![ChatMessage::user("look").with_image(
            crate::llm::InlineImage {
                mime_type: "image/png".to_owned(),
                data: "aGk=".to_owned(),
            },
        )]);
        let err = provider.complete(&request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }
}
