// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Quota defaults, dispatch tuning, and fixed response text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! Constants grouped by domain rather than kept in one large file.

/// Default per-user quota limits
pub mod quotas;

/// Fixed strings returned to end users
pub mod messages;

/// Model dispatch tuning
pub mod dispatch {
    /// Primary provider attempts before falling back
    pub const DEFAULT_MAX_PRIMARY_ATTEMPTS: u32 = 2;
    /// Base backoff between primary attempts, doubled after every failure
    pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
    /// Upper bound for a single provider call
    pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 30;
    /// Conversation turns forwarded as rolling history
    pub const HISTORY_TURNS: i64 = 10;
    /// Maximum characters of a provider error kept in `error_details`
    pub const ERROR_DETAIL_MAX_CHARS: usize = 200;
}

/// Retrieval context limits
pub mod context {
    /// Library snippets returned per query
    pub const MAX_LIBRARY_SNIPPETS: usize = 3;
    /// Characters kept from each library snippet
    pub const LIBRARY_SNIPPET_CHARS: usize = 300;
    /// Organic web results folded into the context block
    pub const MAX_WEB_RESULTS: usize = 3;
}

/// Interaction log limits
pub mod interaction_log {
    /// Characters of the user message kept in a log entry
    pub const USER_MESSAGE_MAX_CHARS: usize = 500;
    /// Characters of the model response kept in a log entry
    pub const AI_RESPONSE_MAX_CHARS: usize = 1_000;
    /// Default bound of the background logging queue
    pub const DEFAULT_QUEUE_CAPACITY: usize = 1_024;
}

/// Network defaults
pub mod ports {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 5000;
}

/// Service identity used in logs
pub mod service_names {
    /// Name of the HTTP server binary
    pub const SOFIA_SERVER: &str = "sofia-ai-server";
}
