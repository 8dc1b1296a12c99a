// ABOUTME: Integration tests for the model dispatcher
// ABOUTME: Provider ordering, retries with backoff, timeouts, fallback marking and multimodal paths
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::time::Duration;

use common::{provider_set, CannedTranscripts, Reply, ScriptedProvider};
use sofia_ai_server::{
    attachments::Attachment,
    classifier::RequestMode,
    constants::messages,
    context::GatheredContext,
    dispatch::{DispatchConfig, DispatchRequest, ModelDispatcher, ModelUsed},
    llm::{InlineImage, MessageRole, ProviderSet},
    models::ConversationTurn,
};

fn config(prefer_secondary_for_chat: bool) -> DispatchConfig {
    DispatchConfig {
        max_primary_attempts: 2,
        backoff_base: Duration::from_secs(1),
        attempt_timeout: Duration::from_secs(30),
        prefer_secondary_for_chat,
    }
}

fn dispatcher(providers: ProviderSet, prefer_secondary_for_chat: bool) -> ModelDispatcher {
    ModelDispatcher::new(
        providers,
        CannedTranscripts::ok("unused"),
        config(prefer_secondary_for_chat),
    )
}

fn chat(message: &str) -> DispatchRequest {
    DispatchRequest {
        message: message.to_owned(),
        mode: RequestMode::Chat,
        history: vec![
            ConversationTurn::user("My name is Ada."),
            ConversationTurn::assistant("Nice to meet you, Ada."),
        ],
        ..DispatchRequest::default()
    }
}

// ============================================================================
// Generic sequence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_primary_success_first_try() {
    let primary = ScriptedProvider::always("gemini", Reply::Text("Hello Ada"));
    let secondary = ScriptedProvider::always("groq", Reply::Text("unused"));
    let dispatcher = dispatcher(provider_set(Some(&primary), Some(&secondary)), false);

    let outcome = dispatcher.dispatch(&chat("What is my name?")).await;

    assert_eq!(outcome.response, "Hello Ada");
    assert_eq!(outcome.model, ModelUsed::Gemini);
    assert!(!outcome.fallback_used);
    assert_eq!(outcome.retry_count, 0);
    assert_eq!(outcome.error_details, None);
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_chat_replays_history_to_provider() {
    let primary = ScriptedProvider::always("gemini", Reply::Text("Ada"));
    let dispatcher = dispatcher(provider_set(Some(&primary), None), false);

    dispatcher.dispatch(&chat("What is my name?")).await;

    let request = primary.last_request();
    let roles: Vec<MessageRole> = request.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User
        ]
    );
    assert_eq!(request.messages[3].content, "What is my name?");
}

#[tokio::test(start_paused = true)]
async fn test_fallback_after_primary_exhausted() {
    let primary = ScriptedProvider::always("gemini", Reply::Unavailable);
    let secondary = ScriptedProvider::always("groq", Reply::Text("From the fallback"));
    let dispatcher = dispatcher(provider_set(Some(&primary), Some(&secondary)), false);

    let outcome = dispatcher.dispatch(&chat("hello again")).await;

    assert_eq!(outcome.response, "From the fallback");
    assert_eq!(outcome.model, ModelUsed::Groq);
    assert!(outcome.fallback_used);
    assert_eq!(outcome.retry_count, 2);
    assert_eq!(primary.calls(), 2);
    assert_eq!(secondary.calls(), 1);
    assert!(outcome
        .error_details
        .as_deref()
        .unwrap()
        .starts_with("unavailable: "));
    // One backoff of 1s between the two primary attempts
    assert!(outcome.response_time_ms >= 1_000);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_attempts() {
    let primary = ScriptedProvider::always("gemini", Reply::RateLimited);
    let mut dispatch_config = config(false);
    dispatch_config.max_primary_attempts = 3;
    let dispatcher = ModelDispatcher::new(
        provider_set(Some(&primary), None),
        CannedTranscripts::ok("unused"),
        dispatch_config,
    );

    let outcome = dispatcher.dispatch(&chat("hello")).await;

    assert_eq!(primary.calls(), 3);
    assert_eq!(outcome.retry_count, 3);
    // 1s + 2s of backoff
    assert!(outcome.response_time_ms >= 3_000);
    assert!(outcome.response_time_ms < 4_000);
    assert!(outcome
        .error_details
        .as_deref()
        .unwrap()
        .starts_with("rate_limited: "));
}

#[tokio::test(start_paused = true)]
async fn test_empty_output_counts_as_failure() {
    let primary = ScriptedProvider::new("gemini", vec![Reply::Empty, Reply::Text("Second time")]);
    let dispatcher = dispatcher(provider_set(Some(&primary), None), false);

    let outcome = dispatcher.dispatch(&chat("hello")).await;

    assert_eq!(outcome.response, "Second time");
    assert_eq!(outcome.model, ModelUsed::Gemini);
    assert_eq!(outcome.retry_count, 1);
    assert!(!outcome.fallback_used);
    assert!(outcome
        .error_details
        .as_deref()
        .unwrap()
        .starts_with("upstream_error: "));
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_falls_through() {
    let primary = ScriptedProvider::always("gemini", Reply::Hang);
    let secondary = ScriptedProvider::always("groq", Reply::Text("Rescued"));
    let dispatcher = dispatcher(provider_set(Some(&primary), Some(&secondary)), false);

    let outcome = dispatcher.dispatch(&chat("hello")).await;

    assert_eq!(outcome.model, ModelUsed::Groq);
    assert!(outcome.fallback_used);
    assert_eq!(outcome.retry_count, 2);
    assert!(outcome
        .error_details
        .as_deref()
        .unwrap()
        .contains("no response within 30s"));
}

#[tokio::test(start_paused = true)]
async fn test_total_failure_shape() {
    let primary = ScriptedProvider::always("gemini", Reply::Unavailable);
    let secondary = ScriptedProvider::always("groq", Reply::RateLimited);
    let dispatcher = dispatcher(provider_set(Some(&primary), Some(&secondary)), false);

    let outcome = dispatcher.dispatch(&chat("hello")).await;

    assert_eq!(outcome.response, messages::ALL_MODELS_FAILED);
    assert_eq!(outcome.model, ModelUsed::Error);
    assert!(!outcome.fallback_used);
    assert_eq!(outcome.retry_count, 2);
    assert!(outcome
        .error_details
        .as_deref()
        .unwrap()
        .starts_with("rate_limited: "));
}

#[tokio::test(start_paused = true)]
async fn test_no_providers_configured() {
    let dispatcher = dispatcher(ProviderSet::default(), true);

    let outcome = dispatcher.dispatch(&chat("hello")).await;

    assert_eq!(outcome.model, ModelUsed::Error);
    assert_eq!(outcome.response, messages::ALL_MODELS_FAILED);
    assert_eq!(
        outcome.error_details.as_deref(),
        Some("config: primary provider not configured")
    );
    assert_eq!(outcome.retry_count, 0);
}

// ============================================================================
// Provider order
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_chat_prefers_secondary_when_configured() {
    let primary = ScriptedProvider::always("gemini", Reply::Text("unused"));
    let secondary = ScriptedProvider::always("groq", Reply::Text("Quick answer"));
    let dispatcher = dispatcher(provider_set(Some(&primary), Some(&secondary)), true);

    let outcome = dispatcher.dispatch(&chat("hello")).await;

    assert_eq!(outcome.model, ModelUsed::Groq);
    assert!(!outcome.fallback_used);
    assert_eq!(primary.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_secondary_first_failure_then_primary() {
    let primary = ScriptedProvider::always("gemini", Reply::Text("Reviewed"));
    let secondary = ScriptedProvider::always("groq", Reply::Unavailable);
    let dispatcher = dispatcher(provider_set(Some(&primary), Some(&secondary)), false);

    let request = DispatchRequest {
        message: "def run(cmd): os.system(cmd)".to_owned(),
        mode: RequestMode::CodeSecurityScan,
        history: vec![ConversationTurn::user("unrelated earlier turn")],
        ..DispatchRequest::default()
    };
    let outcome = dispatcher.dispatch(&request).await;

    assert_eq!(outcome.response, "Reviewed");
    assert_eq!(outcome.model, ModelUsed::Gemini);
    assert!(!outcome.fallback_used);
    assert_eq!(outcome.retry_count, 0);
    assert_eq!(secondary.calls(), 1);
    // Code review never carries history
    assert_eq!(primary.last_request().messages.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_secondary_retried_once_as_fallback() {
    let primary = ScriptedProvider::always("gemini", Reply::Unavailable);
    let secondary = ScriptedProvider::new("groq", vec![Reply::Unavailable, Reply::Text("Second look")]);
    let dispatcher = dispatcher(provider_set(Some(&primary), Some(&secondary)), true);

    let outcome = dispatcher.dispatch(&chat("hello")).await;

    assert_eq!(outcome.response, "Second look");
    assert!(outcome.fallback_used);
    assert_eq!(secondary.calls(), 2);
    assert_eq!(primary.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_context_goes_to_secondary_with_question_last() {
    let secondary = ScriptedProvider::always("groq", Reply::Text("Grounded answer [Source: owasp.org]"));
    let dispatcher = dispatcher(provider_set(None, Some(&secondary)), false);

    let question = "What is SQL injection and how is it mitigated?";
    let request = DispatchRequest {
        message: question.to_owned(),
        mode: RequestMode::SecuritySearch,
        context: GatheredContext {
            web: Some("Title: SQLi\nSnippet: Use parameterized queries\nSource: owasp.org".to_owned()),
            library: None,
        },
        history: vec![ConversationTurn::user("should not be sent")],
        ..DispatchRequest::default()
    };
    let outcome = dispatcher.dispatch(&request).await;

    assert_eq!(outcome.model, ModelUsed::Groq);
    assert!(!outcome.fallback_used);
    let sent = secondary.last_request();
    assert_eq!(sent.messages.len(), 2);
    assert!(sent.messages[1].content.contains("parameterized queries"));
    assert!(sent.messages[1].content.ends_with(question));
}

// ============================================================================
// Multimodal
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_image_is_primary_only() {
    let primary = ScriptedProvider::always("gemini", Reply::Unavailable);
    let secondary = ScriptedProvider::always("groq", Reply::Text("unused"));
    let dispatcher = dispatcher(provider_set(Some(&primary), Some(&secondary)), true);

    let request = DispatchRequest {
        message: "What is in this picture?".to_owned(),
        attachment: Some(Attachment::Image(InlineImage {
            mime_type: "image/png".to_owned(),
            data: "aGVsbG8=".to_owned(),
        })),
        ..DispatchRequest::default()
    };
    let outcome = dispatcher.dispatch(&request).await;

    assert_eq!(outcome.model, ModelUsed::Error);
    assert_eq!(outcome.response, messages::ALL_MODELS_FAILED);
    assert_eq!(primary.calls(), 2);
    assert_eq!(secondary.calls(), 0);
    assert!(primary.last_request().has_images());
}

#[tokio::test(start_paused = true)]
async fn test_document_text_is_inlined() {
    let primary = ScriptedProvider::always("gemini", Reply::Text("Summary"));
    let dispatcher = dispatcher(provider_set(Some(&primary), None), true);

    let request = DispatchRequest {
        message: "Summarize".to_owned(),
        attachment: Some(Attachment::Document {
            text: "Quarterly revenue grew 12%".to_owned(),
            pages: 1,
        }),
        ..DispatchRequest::default()
    };
    let outcome = dispatcher.dispatch(&request).await;

    assert_eq!(outcome.model, ModelUsed::Gemini);
    let sent = primary.last_request();
    assert!(sent.messages[1].content.contains("Quarterly revenue grew 12%"));
    assert!(!sent.has_images());
}

#[tokio::test(start_paused = true)]
async fn test_missing_transcript_short_circuits() {
    let primary = ScriptedProvider::always("gemini", Reply::Text("unused"));
    let dispatcher = ModelDispatcher::new(
        provider_set(Some(&primary), None),
        CannedTranscripts::missing(),
        config(false),
    );

    let request = DispatchRequest {
        message: "Summarize https://youtu.be/dQw4w9WgXcQ".to_owned(),
        video_link: Some("https://youtu.be/dQw4w9WgXcQ".to_owned()),
        ..DispatchRequest::default()
    };
    let outcome = dispatcher.dispatch(&request).await;

    assert_eq!(outcome.response, messages::TRANSCRIPT_UNAVAILABLE);
    assert_eq!(outcome.model, ModelUsed::Error);
    assert_eq!(primary.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transcript_reaches_primary() {
    let primary = ScriptedProvider::always("gemini", Reply::Text("The video explains TLS"));
    let dispatcher = ModelDispatcher::new(
        provider_set(Some(&primary), None),
        CannedTranscripts::ok("today we walk through the TLS handshake and certificates"),
        config(false),
    );

    let request = DispatchRequest {
        message: "What does this cover? https://youtu.be/dQw4w9WgXcQ".to_owned(),
        video_link: Some("https://youtu.be/dQw4w9WgXcQ".to_owned()),
        ..DispatchRequest::default()
    };
    let outcome = dispatcher.dispatch(&request).await;

    assert_eq!(outcome.model, ModelUsed::Gemini);
    assert!(primary.last_request().messages[1]
        .content
        .contains("handshake and certificates"));
}
