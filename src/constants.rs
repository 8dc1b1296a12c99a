// ABOUTME: System-wide constants for the Sofia AI server
// ABOUTME: Re-exports sofia-core constants and names every environment variable read at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Constants Module
//!
//! Numeric defaults and fixed messages live in `sofia-core`. Environment
//! variable names are kept here so configuration code and tests agree on them.

pub use sofia_core::constants::{
    context, dispatch, interaction_log, messages, ports, quotas, service_names,
};

/// Environment variable names
pub mod env_config {
    /// HTTP listen port (takes precedence over `HTTP_PORT`)
    pub const PORT: &str = "PORT";
    /// HTTP listen port
    pub const HTTP_PORT: &str = "HTTP_PORT";
    /// SQLite connection URL
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Deployment environment name
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
    /// Comma-separated CORS origins, `*` for any
    pub const CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";

    /// Primary provider API key
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
    /// Legacy name for the primary provider API key
    pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
    /// Secondary provider API key
    pub const GROQ_API_KEY: &str = "GROQ_API_KEY";
    /// Web search API key
    pub const SERPER_API_KEY: &str = "SERPER_API_KEY";
    /// Primary model override
    pub const PRIMARY_MODEL: &str = "SOFIA_PRIMARY_MODEL";
    /// Secondary model override
    pub const SECONDARY_MODEL: &str = "SOFIA_SECONDARY_MODEL";

    /// Primary attempts before fallback
    pub const LLM_MAX_ATTEMPTS: &str = "SOFIA_LLM_MAX_ATTEMPTS";
    /// Base backoff in milliseconds
    pub const LLM_BACKOFF_MS: &str = "SOFIA_LLM_BACKOFF_MS";
    /// Per-attempt timeout in seconds
    pub const LLM_ATTEMPT_TIMEOUT_SECS: &str = "SOFIA_LLM_ATTEMPT_TIMEOUT_SECS";
    /// Try the secondary provider first for plain chat
    pub const PREFER_SECONDARY_FOR_CHAT: &str = "SOFIA_PREFER_SECONDARY_FOR_CHAT";

    /// Monthly message quota
    pub const QUOTA_MESSAGES_PER_MONTH: &str = "SOFIA_QUOTA_MESSAGES_PER_MONTH";
    /// Daily web search quota
    pub const QUOTA_WEB_SEARCHES_PER_DAY: &str = "SOFIA_QUOTA_WEB_SEARCHES_PER_DAY";
    /// Monthly document read quota
    pub const QUOTA_DOCUMENT_READS_PER_MONTH: &str = "SOFIA_QUOTA_DOCUMENT_READS_PER_MONTH";
    /// Monthly document page quota
    pub const QUOTA_DOCUMENT_PAGES_PER_MONTH: &str = "SOFIA_QUOTA_DOCUMENT_PAGES_PER_MONTH";
    /// Daily voice command quota
    pub const QUOTA_VOICE_COMMANDS_PER_DAY: &str = "SOFIA_QUOTA_VOICE_COMMANDS_PER_DAY";

    /// Interaction log queue bound
    pub const INTERACTION_LOG_CAPACITY: &str = "SOFIA_INTERACTION_LOG_CAPACITY";
}
