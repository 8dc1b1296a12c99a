// ABOUTME: Main library entry point for the Sofia AI chat backend
// ABOUTME: Routes chat messages across LLM providers with quotas, retrieval context and fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

#![deny(unsafe_code)]

//! # Sofia AI Server
//!
//! A web backend that sends each chat message to one of two LLM providers.
//! Messages can be augmented with web search results and snippets from the
//! user's own document library, are gated by per-user usage quotas, and every
//! interaction is logged in the background.
//!
//! ## Architecture
//!
//! ```text
//! POST /chat ─▶ QuotaTracker ─▶ classify ─▶ ContextGatherer ─▶ ModelDispatcher ─▶ response
//!                                                                    │
//!                                                                    └─▶ ResponseLogger (background)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sofia_ai_server::config::ServerConfig;
//! use sofia_ai_server::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Sofia AI configured on port {}", config.http_port);
//!     Ok(())
//! }
//! ```

// ── Public API ──────────────────────────────────────────────────────────
// Used by the server binary (src/bin/) and integration tests (tests/).

/// File attachment decoding (images, PDF, Word, plain text)
pub mod attachments;

/// Session authentication for HTTP handlers
pub mod auth;

/// Request mode classification
pub mod classifier;

/// Environment configuration
pub mod config;

/// Application constants and environment variable names
pub mod constants;

/// Retrieval context from web search and the user's library
pub mod context;

/// `SQLite` storage
pub mod database;

/// Primary/secondary model dispatch with retries and fallback
pub mod dispatch;

/// Unified error handling
pub mod errors;

/// External API clients
pub mod external;

/// Background interaction logging
pub mod interaction_log;

/// LLM provider abstraction and implementations
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Shared data models
pub mod models;

/// Per-user usage quotas
pub mod quota;

/// Dependency-injected server resources
pub mod resources;

/// HTTP routes
pub mod routes;
