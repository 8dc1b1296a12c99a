// ABOUTME: HTTP tests for POST /chat through the full router
// ABOUTME: Authentication, quota gating, history persistence, context and admin-only error details
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{
    create_test_database, create_test_user, provider_set, test_config, test_resources,
    CannedTranscripts, CannedWebSearch, Reply, ScriptedProvider, Tier,
};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use sofia_ai_server::{
    config::ServerConfig,
    constants::messages,
    context::WEB_BLOCK_HEADING,
    database::{Database, InteractionRecord},
    external::DisabledWebSearch,
    quota::QuotaStore,
    resources::ServerResources,
    routes::build_router,
};
use uuid::Uuid;

struct Harness {
    database: Database,
    resources: Arc<ServerResources>,
    primary: Arc<ScriptedProvider>,
    secondary: Arc<ScriptedProvider>,
}

impl Harness {
    async fn new(config: ServerConfig) -> Self {
        Self::with(
            config,
            ScriptedProvider::always("gemini", Reply::Text("primary answer")),
            ScriptedProvider::always("groq", Reply::Text("secondary answer")),
            None,
        )
        .await
    }

    async fn with(
        config: ServerConfig,
        primary: Arc<ScriptedProvider>,
        secondary: Arc<ScriptedProvider>,
        web: Option<Arc<CannedWebSearch>>,
    ) -> Self {
        let database = create_test_database().await;
        let web: Arc<dyn sofia_ai_server::context::WebSearch> = match web {
            Some(web) => web,
            None => Arc::new(DisabledWebSearch),
        };
        let (resources, _worker) = test_resources(
            database.clone(),
            config,
            provider_set(Some(&primary), Some(&secondary)),
            web,
            CannedTranscripts::ok("transcript"),
        );
        Self {
            database,
            resources,
            primary,
            secondary,
        }
    }

    async fn chat(&self, session: &str, body: Value) -> helpers::axum_test::AxumTestResponse {
        AxumTestRequest::post("/chat")
            .session(session)
            .json(&body)
            .send(build_router(&self.resources))
            .await
    }

    async fn interactions(&self, user_id: Uuid) -> Vec<InteractionRecord> {
        for _ in 0..50 {
            let records = self.database.recent_interactions(user_id, 10).await.unwrap();
            if !records.is_empty() {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Vec::new()
    }
}

#[tokio::test]
async fn test_chat_requires_session() {
    let harness = Harness::new(test_config()).await;

    let response = AxumTestRequest::post("/chat")
        .json(&json!({"text": "hello"}))
        .send(build_router(&harness.resources))
        .await;
    assert_eq!(response.status(), 401);

    let response = harness.chat("not-a-session", json!({"text": "hello"})).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let harness = Harness::new(test_config()).await;
    let (_, session) = create_test_user(&harness.database, Tier::Free).await;

    let response = harness.chat(&session, json!({"text": "   "})).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_plain_chat_persists_and_continues_conversation() {
    let harness = Harness::new(test_config()).await;
    let (user, session) = create_test_user(&harness.database, Tier::Free).await;

    let first: Value = harness
        .chat(&session, json!({"text": "hi there, I am Ada"}))
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert_eq!(first["response"], "secondary answer");
    assert_eq!(first["model"], "groq");
    assert_eq!(first["fallback_used"], false);
    assert!(first.get("error_details").is_none());
    let conversation_id = first["conversation_id"].as_str().unwrap().to_owned();

    let second: Value = harness
        .chat(
            &session,
            json!({"text": "hi again", "conversationId": conversation_id}),
        )
        .await
        .json();
    assert_eq!(second["conversation_id"], conversation_id.as_str());

    // system + two stored turns + the new message
    let sent = harness.secondary.last_request();
    assert_eq!(sent.messages.len(), 4);
    assert_eq!(sent.messages[1].content, "hi there, I am Ada");

    let turns = harness
        .database
        .get_recent_turns(&conversation_id, 10)
        .await
        .unwrap();
    assert_eq!(turns.len(), 4);

    let logged = harness.interactions(user.id).await;
    assert!(!logged.is_empty());
    assert_eq!(logged[0].model_used, "groq");
    assert_eq!(logged[0].request_mode, "chat");
}

#[tokio::test]
async fn test_temporary_chat_leaves_no_history() {
    let harness = Harness::new(test_config()).await;
    let (user, session) = create_test_user(&harness.database, Tier::Free).await;

    let body: Value = harness
        .chat(&session, json!({"text": "hello", "isTemporary": true}))
        .await
        .assert_status(StatusCode::OK)
        .json();

    assert!(body.get("conversation_id").is_none());
    let conversations = harness.database.list_conversations(user.id, 10).await.unwrap();
    assert!(conversations.is_empty());
}

#[tokio::test]
async fn test_message_quota_returns_429() {
    let mut config = test_config();
    config.quotas.messages_per_month = 1;
    let harness = Harness::new(config).await;
    let (_, session) = create_test_user(&harness.database, Tier::Free).await;

    harness
        .chat(&session, json!({"text": "hello"}))
        .await
        .assert_status(StatusCode::OK);

    let body: Value = harness
        .chat(&session, json!({"text": "hello again"}))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS)
        .json();
    assert_eq!(body["upgrade_required"], true);
    assert_eq!(body["current_usage"], 1);
    assert_eq!(body["limit"], 1);
    assert!(body["error"].as_str().unwrap().contains("messages"));
    assert_eq!(harness.secondary.calls(), 1);
}

#[tokio::test]
async fn test_premium_bypasses_quota() {
    let mut config = test_config();
    config.quotas.messages_per_month = 1;
    let harness = Harness::new(config).await;
    let (_, session) = create_test_user(&harness.database, Tier::Premium).await;

    for _ in 0..3 {
        harness
            .chat(&session, json!({"text": "hello"}))
            .await
            .assert_status(StatusCode::OK);
    }
}

#[tokio::test]
async fn test_voice_quota() {
    let mut config = test_config();
    config.quotas.voice_commands_per_day = 1;
    let harness = Harness::new(config).await;
    let (_, session) = create_test_user(&harness.database, Tier::Free).await;

    harness
        .chat(&session, json!({"text": "hello", "mode": "voice_mode"}))
        .await
        .assert_status(StatusCode::OK);
    harness
        .chat(&session, json!({"text": "hello", "mode": "mic_input"}))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
    // Typed messages are unaffected
    harness
        .chat(&session, json!({"text": "hello"}))
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_document_quota_and_primary_only_path() {
    let harness = Harness::new(test_config()).await;
    let (_, session) = create_test_user(&harness.database, Tier::Free).await;
    let document = STANDARD.encode("Incident report: the VPN certificate expired on Monday.");

    let body: Value = harness
        .chat(
            &session,
            json!({"text": "Summarize this", "fileData": document, "fileType": "text/plain"}),
        )
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(body["model"], "gemini");
    assert_eq!(harness.secondary.calls(), 0);
    assert!(harness.primary.last_request().messages[1]
        .content
        .contains("VPN certificate expired"));

    // One document read per month by default
    harness
        .chat(
            &session,
            json!({"text": "And this one", "fileData": document, "fileType": "text/plain"}),
        )
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_unsupported_file_is_rejected() {
    let harness = Harness::new(test_config()).await;
    let (_, session) = create_test_user(&harness.database, Tier::Free).await;

    let response = harness
        .chat(
            &session,
            json!({
                "text": "run this",
                "fileData": STANDARD.encode("MZ"),
                "fileType": "application/x-msdownload"
            }),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(harness.primary.calls(), 0);
}

#[tokio::test]
async fn test_rejected_attachments_cost_no_message() {
    let mut config = test_config();
    config.quotas.messages_per_month = 2;
    let harness = Harness::new(config).await;
    let (user, session) = create_test_user(&harness.database, Tier::Free).await;

    harness
        .chat(
            &session,
            json!({"text": "run this", "fileData": STANDARD.encode("MZ"), "fileType": "application/x-msdownload"}),
        )
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    harness
        .chat(
            &session,
            json!({"text": "read this", "fileData": "not base64!!", "fileType": "text/plain"}),
        )
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    harness
        .chat(&session, json!({"text": "hello"}))
        .await
        .assert_status(StatusCode::OK);

    let usage = harness.database.usage_snapshot(user.id).await.unwrap();
    assert_eq!(usage.messages_used, 1);
}

#[tokio::test]
async fn test_denied_voice_command_refunds_message() {
    let mut config = test_config();
    config.quotas.messages_per_month = 5;
    config.quotas.voice_commands_per_day = 1;
    let harness = Harness::new(config).await;
    let (user, session) = create_test_user(&harness.database, Tier::Free).await;

    harness
        .chat(&session, json!({"text": "hello", "mode": "voice_mode"}))
        .await
        .assert_status(StatusCode::OK);
    for _ in 0..3 {
        harness
            .chat(&session, json!({"text": "hello", "mode": "voice_mode"}))
            .await
            .assert_status(StatusCode::TOO_MANY_REQUESTS);
    }

    let usage = harness.database.usage_snapshot(user.id).await.unwrap();
    assert_eq!(usage.messages_used, 1);
    assert_eq!(usage.voice_commands_used, 1);
}

#[tokio::test]
async fn test_denied_document_refunds_message_and_voice() {
    let mut config = test_config();
    config.quotas.document_reads_per_month = 1;
    let harness = Harness::new(config).await;
    let (user, session) = create_test_user(&harness.database, Tier::Free).await;
    let document = STANDARD.encode("Quarterly access review notes.");
    let body = json!({
        "text": "Summarize this",
        "fileData": document,
        "fileType": "text/plain",
        "mode": "mic_input"
    });

    harness
        .chat(&session, body.clone())
        .await
        .assert_status(StatusCode::OK);
    harness
        .chat(&session, body)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    let usage = harness.database.usage_snapshot(user.id).await.unwrap();
    assert_eq!(usage.messages_used, 1);
    assert_eq!(usage.voice_commands_used, 1);
    assert_eq!(usage.document_reads_used, 1);
    assert_eq!(harness.primary.calls(), 1);
}

#[tokio::test]
async fn test_web_search_limit_becomes_context() {
    let web = CannedWebSearch::ok("Title: Rust 1.90\nSnippet: Released today\nSource: blog.rust-lang.org");
    let harness = Harness::with(
        test_config(),
        ScriptedProvider::always("gemini", Reply::Text("unused")),
        ScriptedProvider::always("groq", Reply::Text("grounded")),
        Some(Arc::clone(&web)),
    )
    .await;
    let (_, session) = create_test_user(&harness.database, Tier::Free).await;

    let question = "what is the latest rust release";
    harness
        .chat(&session, json!({"text": question, "isTemporary": true}))
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(web.calls(), 1);
    let first = harness.secondary.last_request();
    assert!(first.messages[1].content.contains(WEB_BLOCK_HEADING));
    assert!(first.messages[1].content.contains("Released today"));
    assert!(first.messages[1].content.ends_with(question));

    harness
        .chat(&session, json!({"text": question, "isTemporary": true}))
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(web.calls(), 1);
    let second = harness.secondary.last_request();
    assert!(second.messages[1]
        .content
        .contains(messages::WEB_SEARCH_LIMIT_REACHED));
}

#[tokio::test]
async fn test_total_failure_details_only_for_admins() {
    let mut config = test_config();
    config.dispatch.prefer_secondary_for_chat = false;
    let harness = Harness::with(
        config,
        ScriptedProvider::always("gemini", Reply::Unavailable),
        ScriptedProvider::always("groq", Reply::RateLimited),
        None,
    )
    .await;
    let (_, user_session) = create_test_user(&harness.database, Tier::Free).await;
    let (_, admin_session) = create_test_user(&harness.database, Tier::Admin).await;

    let body: Value = harness
        .chat(&user_session, json!({"text": "hello"}))
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(body["model"], "error");
    assert_eq!(body["response"], messages::ALL_MODELS_FAILED);
    assert!(body.get("error_details").is_none());
    assert!(body.get("conversation_id").is_none());

    let body: Value = harness
        .chat(&admin_session, json!({"text": "hello"}))
        .await
        .json();
    assert!(body["error_details"]
        .as_str()
        .unwrap()
        .starts_with("rate_limited: "));
}

#[tokio::test]
async fn test_cookie_session_is_accepted() {
    let harness = Harness::new(test_config()).await;
    let (_, session) = create_test_user(&harness.database, Tier::Free).await;

    let response = AxumTestRequest::post("/chat")
        .cookie("session_id", &session)
        .json(&json!({"text": "hello"}))
        .send(build_router(&harness.resources))
        .await;
    assert_eq!(response.status(), 200);
}
