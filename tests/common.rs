// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: In-memory database, test users, scripted LLM providers and canned search backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `sofia_ai_server`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use sofia_ai_server::{
    config::ServerConfig,
    context::WebSearch,
    database::Database,
    errors::{AppError, AppResult},
    external::TranscriptFetcher,
    llm::{ChatRequest, ChatResponse, LlmCapabilities, LlmProvider, ProviderSet},
    models::User,
    resources::{Backends, ServerResources},
};
use tokio::task::JoinHandle;
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test database setup
pub async fn create_test_database() -> Database {
    init_test_logging();
    Database::new("sqlite::memory:").await.unwrap()
}

/// Account tiers used by tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Premium,
    Admin,
}

/// Create a user with an active session; returns the user and its session id
pub async fn create_test_user(database: &Database, tier: Tier) -> (User, String) {
    let id = Uuid::new_v4();
    let session = format!("session-{id}");
    let mut user = User::new(format!("user-{id}@example.com"), Some("Test User".to_owned()));
    user.id = id;
    user.session_id = Some(session.clone());
    user.is_premium = tier == Tier::Premium;
    user.is_admin = tier == Tier::Admin;
    database.create_user(&user).await.unwrap();
    (user, session)
}

// ============================================================================
// Scripted LLM provider
// ============================================================================

/// One scripted provider reaction
#[derive(Debug, Clone)]
pub enum Reply {
    /// Successful completion
    Text(&'static str),
    /// 5xx-style failure
    Unavailable,
    /// 429-style failure
    RateLimited,
    /// Success with no content
    Empty,
    /// Never answers
    Hang,
}

/// Provider that replays a script; the last reply repeats once the script runs out
pub struct ScriptedProvider {
    name: &'static str,
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Reply>,
    calls: AtomicU32,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, script: Vec<Reply>) -> Arc<Self> {
        let last = script.last().cloned().unwrap_or(Reply::Unavailable);
        Arc::new(Self {
            name,
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn always(name: &'static str, reply: Reply) -> Arc<Self> {
        Self::new(name, vec![reply])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ChatRequest {
        self.requests().pop().expect("provider was never called")
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn display_name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::multimodal()
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let reply = {
            let mut script = self.script.lock().unwrap();
            script
                .pop_front()
                .unwrap_or_else(|| self.last.lock().unwrap().clone())
        };

        let content = match reply {
            Reply::Text(text) => text.to_owned(),
            Reply::Empty => String::new(),
            Reply::Unavailable => {
                return Err(AppError::external_unavailable(self.name, "503 Service Unavailable"))
            }
            Reply::RateLimited => {
                return Err(AppError::external_rate_limited(self.name, "quota exhausted"))
            }
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                String::new()
            }
        };

        Ok(ChatResponse {
            content,
            model: "scripted-model".to_owned(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

/// Provider set from optional scripted providers
pub fn provider_set(
    primary: Option<&Arc<ScriptedProvider>>,
    secondary: Option<&Arc<ScriptedProvider>>,
) -> ProviderSet {
    ProviderSet::new(
        primary.map(|p| Arc::clone(p) as Arc<dyn LlmProvider>),
        secondary.map(|p| Arc::clone(p) as Arc<dyn LlmProvider>),
    )
}

// ============================================================================
// Canned search and transcript backends
// ============================================================================

/// Web search returning a fixed result
pub struct CannedWebSearch {
    result: Result<String, String>,
    calls: AtomicU32,
}

impl CannedWebSearch {
    pub fn ok(result: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(result.to_owned()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: Err("connection reset".to_owned()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for CannedWebSearch {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn search(&self, _query: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(|e| AppError::external_unavailable("canned", e))
    }
}

/// Transcript fetcher returning a fixed transcript or failing
pub struct CannedTranscripts {
    transcript: Option<&'static str>,
}

impl CannedTranscripts {
    pub fn ok(transcript: &'static str) -> Arc<Self> {
        Arc::new(Self {
            transcript: Some(transcript),
        })
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self { transcript: None })
    }
}

#[async_trait]
impl TranscriptFetcher for CannedTranscripts {
    async fn fetch(&self, _video_url: &str) -> AppResult<String> {
        self.transcript
            .map(str::to_owned)
            .ok_or_else(|| AppError::not_found("Video captions"))
    }
}

// ============================================================================
// Server resources
// ============================================================================

/// Configuration with a short backoff so tests do not sleep for seconds
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.database_url = "sqlite::memory:".to_owned();
    config.dispatch.backoff_base = Duration::from_millis(1);
    config.dispatch.attempt_timeout = Duration::from_secs(5);
    config
}

/// Resources around an existing database and explicit backends
pub fn test_resources(
    database: Database,
    config: ServerConfig,
    providers: ProviderSet,
    web: Arc<dyn WebSearch>,
    transcripts: Arc<dyn TranscriptFetcher>,
) -> (Arc<ServerResources>, JoinHandle<()>) {
    let (resources, worker) = ServerResources::with_backends(
        database,
        config,
        Backends {
            providers,
            web,
            transcripts,
        },
    );
    (Arc::new(resources), worker)
}
