// ABOUTME: Model dispatcher with primary retries, exponential backoff and secondary fallback
// ABOUTME: Turns a classified request into a normalized response envelope that never fails
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Model Dispatcher
//!
//! ```text
//! [secondary first] ─ok─▶ SUCCESS
//!        │ fail / skipped
//!        ▼
//! ATTEMPT_PRIMARY(1) ─fail─▶ sleep(base) ─▶ ATTEMPT_PRIMARY(2) ─fail─▶ ... ─▶ ATTEMPT_FALLBACK
//!        │ ok                                      │ ok                          │ ok    │ fail
//!        ▼                                         ▼                             ▼       ▼
//!     SUCCESS                                   SUCCESS            SUCCESS (fallback)  FAILURE
//! ```
//!
//! The secondary provider is tried first for code review, for grounded answers
//! and (when configured) for plain chat. Multimodal requests only use the
//! primary provider and never fall back. Every attempt runs under a timeout and
//! an empty reply counts as a failure. Dispatch has no effect on stored
//! conversations.

mod prompt;

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

use crate::attachments::Attachment;
use crate::classifier::RequestMode;
use crate::constants::{dispatch as defaults, env_config, messages};
use crate::context::GatheredContext;
use crate::errors::AppError;
use crate::external::TranscriptFetcher;
use crate::llm::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, ProviderSet};
use crate::logging::AppLogger;
use crate::models::ConversationTurn;

// ============================================================================
// Configuration
// ============================================================================

/// Retry and ordering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Primary attempts before falling back
    pub max_primary_attempts: u32,
    /// Delay after the first failed primary attempt; doubles each time
    pub backoff_base: Duration,
    /// Upper bound for one provider call
    pub attempt_timeout: Duration,
    /// Try the secondary provider first for plain chat
    pub prefer_secondary_for_chat: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_primary_attempts: defaults::DEFAULT_MAX_PRIMARY_ATTEMPTS,
            backoff_base: Duration::from_millis(defaults::DEFAULT_BACKOFF_BASE_MS),
            attempt_timeout: Duration::from_secs(defaults::DEFAULT_ATTEMPT_TIMEOUT_SECS),
            prefer_secondary_for_chat: true,
        }
    }
}

impl DispatchConfig {
    /// Load dispatch tuning from environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_primary_attempts: env::var(env_config::LLM_MAX_ATTEMPTS)
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_primary_attempts),
            backoff_base: env::var(env_config::LLM_BACKOFF_MS)
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(defaults.backoff_base, Duration::from_millis),
            attempt_timeout: env::var(env_config::LLM_ATTEMPT_TIMEOUT_SECS)
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&s: &u64| s > 0)
                .map_or(defaults.attempt_timeout, Duration::from_secs),
            prefer_secondary_for_chat: env::var(env_config::PREFER_SECONDARY_FOR_CHAT)
                .map_or(defaults.prefer_secondary_for_chat, |v| {
                    !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no")
                }),
        }
    }

    /// Delay after the `failed_attempt`-th primary failure (1-based)
    #[must_use]
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1_u32 << exponent)
    }
}

// ============================================================================
// Request and response envelope
// ============================================================================

/// Which provider slot produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelUsed {
    /// Primary slot
    Gemini,
    /// Secondary slot
    Groq,
    /// No provider produced a usable response
    Error,
}

impl ModelUsed {
    /// Wire and log name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Groq => "groq",
            Self::Error => "error",
        }
    }
}

impl Display for ModelUsed {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Everything the dispatcher needs for one chat request
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    /// The user's message
    pub message: String,
    /// Classified mode
    pub mode: RequestMode,
    /// Retrieval context
    pub context: GatheredContext,
    /// Rolling history, oldest first
    pub history: Vec<ConversationTurn>,
    /// Decoded file attachment
    pub attachment: Option<Attachment>,
    /// Recognized video link in the message
    pub video_link: Option<String>,
}

impl DispatchRequest {
    /// Whether the request takes the multimodal path
    #[must_use]
    pub const fn is_multimodal(&self) -> bool {
        self.attachment.is_some() || self.video_link.is_some()
    }
}

/// Normalized result of a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Text shown to the user
    pub response: String,
    /// Slot that produced `response`
    pub model: ModelUsed,
    /// Wall-clock milliseconds since dispatch started
    pub response_time_ms: u64,
    /// True only when the secondary answered after the primary failed
    pub fallback_used: bool,
    /// Last failure as `"<kind>: <message>"`
    pub error_details: Option<String>,
    /// Failed primary attempts
    pub retry_count: u32,
}

/// Failure bookkeeping across the attempts of one dispatch
#[derive(Debug, Default)]
struct AttemptLog {
    error_details: Option<String>,
    retry_count: u32,
}

impl AttemptLog {
    fn record(&mut self, provider: &str, attempt: u32, error: &AppError) {
        let message: String = error
            .message
            .chars()
            .take(defaults::ERROR_DETAIL_MAX_CHARS)
            .collect();
        AppLogger::log_provider_failure(provider, attempt, error.code.kind(), &message);
        self.error_details = Some(format!("{}: {message}", error.code.kind()));
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes requests across the primary and secondary providers
#[derive(Clone)]
pub struct ModelDispatcher {
    providers: ProviderSet,
    transcripts: Arc<dyn TranscriptFetcher>,
    config: DispatchConfig,
}

impl ModelDispatcher {
    /// Create a dispatcher
    #[must_use]
    pub fn new(
        providers: ProviderSet,
        transcripts: Arc<dyn TranscriptFetcher>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            providers,
            transcripts,
            config,
        }
    }

    /// Configured providers
    #[must_use]
    pub const fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// Dispatch a request; provider failures are folded into the envelope
    pub async fn dispatch(&self, request: &DispatchRequest) -> DispatchOutcome {
        let started = Instant::now();
        let mut log = AttemptLog::default();

        let result = if request.is_multimodal() {
            self.dispatch_multimodal(request, &mut log).await
        } else {
            self.dispatch_text(request, &mut log).await
        };

        let (response, model, fallback_used) = match result {
            Dispatched::Answered {
                content,
                model,
                fallback_used,
            } => (content, model, fallback_used),
            Dispatched::Failed => (messages::ALL_MODELS_FAILED.to_owned(), ModelUsed::Error, false),
            Dispatched::NoTranscript => {
                (messages::TRANSCRIPT_UNAVAILABLE.to_owned(), ModelUsed::Error, false)
            }
        };

        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            mode = %request.mode,
            model = %model,
            fallback_used,
            retries = log.retry_count,
            response_time_ms,
            "Dispatch finished"
        );

        DispatchOutcome {
            response,
            model,
            response_time_ms,
            fallback_used,
            error_details: log.error_details,
            retry_count: log.retry_count,
        }
    }

    async fn dispatch_text(&self, request: &DispatchRequest, log: &mut AttemptLog) -> Dispatched {
        let chat_request = ChatRequest::new(prompt::text_messages(request));

        if self.secondary_first(request) {
            if let Some(secondary) = &self.providers.secondary {
                match self.attempt(secondary.as_ref(), &chat_request).await {
                    Ok(response) => return Dispatched::answered(response, ModelUsed::Groq, false),
                    Err(e) => log.record(secondary.name(), 1, &e),
                }
            }
        }

        if let Some(response) = self.attempt_primary(&chat_request, log).await {
            return Dispatched::answered(response, ModelUsed::Gemini, false);
        }

        if let Some(secondary) = &self.providers.secondary {
            info!(provider = secondary.name(), "Falling back to secondary provider");
            match self.attempt(secondary.as_ref(), &chat_request).await {
                Ok(response) => return Dispatched::answered(response, ModelUsed::Groq, true),
                Err(e) => log.record(secondary.name(), 1, &e),
            }
        }

        Dispatched::Failed
    }

    async fn dispatch_multimodal(
        &self,
        request: &DispatchRequest,
        log: &mut AttemptLog,
    ) -> Dispatched {
        let messages: Vec<ChatMessage> = if let Some(attachment) = &request.attachment {
            prompt::attachment_messages(&request.message, attachment)
        } else if let Some(link) = &request.video_link {
            match self.transcripts.fetch(link).await {
                Ok(transcript) => prompt::transcript_messages(&request.message, &transcript),
                Err(e) => {
                    log.record("transcripts", 1, &e);
                    return Dispatched::NoTranscript;
                }
            }
        } else {
            return Dispatched::Failed;
        };

        let chat_request = ChatRequest::new(messages);
        match self.attempt_primary(&chat_request, log).await {
            Some(response) => Dispatched::answered(response, ModelUsed::Gemini, false),
            None => Dispatched::Failed,
        }
    }

    fn secondary_first(&self, request: &DispatchRequest) -> bool {
        request.mode == RequestMode::CodeSecurityScan
            || request.context.has_context()
            || self.config.prefer_secondary_for_chat
    }

    /// Primary attempts with exponential backoff in between
    async fn attempt_primary(
        &self,
        request: &ChatRequest,
        log: &mut AttemptLog,
    ) -> Option<ChatResponse> {
        let Some(primary) = &self.providers.primary else {
            log.record(
                "primary",
                0,
                &AppError::config("primary provider not configured"),
            );
            return None;
        };

        let attempts = self.config.max_primary_attempts.max(1);
        for attempt in 1..=attempts {
            match self.attempt(primary.as_ref(), request).await {
                Ok(response) => return Some(response),
                Err(e) => {
                    log.retry_count += 1;
                    log.record(primary.name(), attempt, &e);
                    if attempt < attempts {
                        sleep(self.config.backoff_for(attempt)).await;
                    }
                }
            }
        }
        None
    }

    /// One bounded provider call; empty output is a failure
    async fn attempt(
        &self,
        provider: &dyn LlmProvider,
        request: &ChatRequest,
    ) -> Result<ChatResponse, AppError> {
        let response = timeout(self.config.attempt_timeout, provider.complete(request))
            .await
            .map_err(|_| {
                AppError::external_unavailable(
                    provider.name(),
                    format!(
                        "no response within {}s",
                        self.config.attempt_timeout.as_secs()
                    ),
                )
            })??;

        if response.content.trim().is_empty() {
            return Err(AppError::external_service(
                provider.name(),
                "provider returned an empty response",
            ));
        }
        Ok(response)
    }
}

enum Dispatched {
    Answered {
        content: String,
        model: ModelUsed,
        fallback_used: bool,
    },
    Failed,
    NoTranscript,
}

impl Dispatched {
    fn answered(response: ChatResponse, model: ModelUsed, fallback_used: bool) -> Self {
        Self::Answered {
            content: response.content,
            model,
            fallback_used,
        }
    }
}
