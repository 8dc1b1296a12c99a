// ABOUTME: Serper.dev web search client
// ABOUTME: Renders a direct answer or the top organic results as plain text for the model
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! Serper Google Search API client
//!
//! # API Reference
//! Serper: <https://serper.dev>
//!
//! The response is flattened to text: an answer box becomes a
//! `Direct Answer:` line, otherwise the first organic results are rendered as
//! `Title` / `Snippet` / `Source` groups separated by blank lines.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::constants::{context as limits, messages};
use crate::context::WebSearch;
use crate::errors::{AppError, AppResult};

/// Serper client configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SerperConfig {
    /// API key sent as `X-API-KEY`
    pub api_key: String,
    /// Search endpoint (default: <https://google.serper.dev/search>)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl SerperConfig {
    /// Configuration with the public endpoint
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://google.serper.dev/search".to_owned(),
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for SerperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(rename = "answerBox")]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct AnswerBox {
    answer: Option<String>,
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

/// Serper web search backend
#[derive(Debug)]
pub struct SerperClient {
    config: SerperConfig,
    http_client: reqwest::Client,
}

impl SerperClient {
    /// Create a new Serper client
    #[must_use]
    pub fn new(config: SerperConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config,
            http_client,
        }
    }

    fn render(response: &SearchResponse) -> String {
        if let Some(answer) = response
            .answer_box
            .as_ref()
            .and_then(|b| b.answer.as_deref().or(b.snippet.as_deref()))
            .filter(|a| !a.trim().is_empty())
        {
            return format!("Direct Answer: {answer}");
        }

        response
            .organic
            .iter()
            .take(limits::MAX_WEB_RESULTS)
            .map(|r| format!("Title: {}\nSnippet: {}\nSource: {}", r.title, r.snippet, r.link))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl WebSearch for SerperClient {
    fn name(&self) -> &'static str {
        "serper"
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> AppResult<String> {
        let response = self
            .http_client
            .post(&self.config.base_url)
            .header("X-API-KEY", &self.config.api_key)
            .json(&SearchRequest { q: query })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external_service(
                "serper",
                format!(
                    "HTTP {status}: {}",
                    response
                        .text()
                        .await
                        .unwrap_or_default()
                        .chars()
                        .take(200)
                        .collect::<String>()
                ),
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::external_service("serper", format!("JSON parse error: {e}")))?;

        debug!(organic = body.organic.len(), "Serper search completed");
        Ok(Self::render(&body))
    }
}

/// Web search used when no API key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledWebSearch;

#[async_trait]
impl WebSearch for DisabledWebSearch {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn search(&self, _query: &str) -> AppResult<String> {
        Ok(messages::WEB_SEARCH_NOT_CONFIGURED.to_owned())
    }
}
