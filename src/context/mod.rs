// ABOUTME: Retrieval context for web and security questions
// ABOUTME: Runs quota-gated web search and private library search, formatting labeled snippets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Context Gatherer
//!
//! Only `web_search` and `security_search` requests gather context. Both
//! sources degrade instead of failing: a web search problem becomes a short
//! human-readable line, and a library problem simply yields no library block.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::classifier::RequestMode;
use crate::constants::{context as limits, messages};
use crate::errors::AppResult;
use crate::logging::AppLogger;
use crate::quota::{QuotaAction, QuotaDecision, QuotaTracker};

/// Heading of the web block in an augmented prompt
pub const WEB_BLOCK_HEADING: &str = "--- Web Search Results ---";

/// Heading of the library block in an augmented prompt
pub const LIBRARY_BLOCK_HEADING: &str = "--- From Your Library ---";

// ============================================================================
// Collaborator traits
// ============================================================================

/// A matching entry from a user's private library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryHit {
    /// Label shown to the model, usually the file name
    pub source: String,
    /// Full extracted text
    pub text: String,
}

/// Keyword search over a user's uploaded documents
#[async_trait]
pub trait LibrarySearch: Send + Sync {
    /// Entries containing every whitespace-separated keyword of `query`
    /// (case-insensitive), newest first, at most `limit`
    async fn search(&self, user_id: Uuid, query: &str, limit: usize) -> AppResult<Vec<LibraryHit>>;
}

/// Library search for deployments without a document store
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLibrary;

#[async_trait]
impl LibrarySearch for NoLibrary {
    async fn search(&self, _: Uuid, _: &str, _: usize) -> AppResult<Vec<LibraryHit>> {
        Ok(Vec::new())
    }
}

/// Web search backend
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Whether searches can run at all; unconfigured backends consume no quota
    fn is_configured(&self) -> bool {
        true
    }

    /// Search and render the results as plain text for the model
    async fn search(&self, query: &str) -> AppResult<String>;
}

// ============================================================================
// Gathered context
// ============================================================================

/// Retrieval output for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatheredContext {
    /// Web results, a degradation notice, or the limit-reached sentinel
    pub web: Option<String>,
    /// Formatted library snippets
    pub library: Option<String>,
}

impl GatheredContext {
    /// Whether any block will be added to the prompt
    #[must_use]
    pub const fn has_context(&self) -> bool {
        self.web.is_some() || self.library.is_some()
    }

    /// Labeled context blocks followed by the original question, verbatim, at the end
    #[must_use]
    pub fn augment(&self, question: &str) -> String {
        let mut prompt = String::new();
        if let Some(web) = &self.web {
            prompt.push_str(WEB_BLOCK_HEADING);
            prompt.push('\n');
            prompt.push_str(web);
            prompt.push_str("\n\n");
        }
        if let Some(library) = &self.library {
            prompt.push_str(LIBRARY_BLOCK_HEADING);
            prompt.push('\n');
            prompt.push_str(library);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Question: ");
        prompt.push_str(question);
        prompt
    }
}

/// Render library hits as `Source: ...` / `Snippet: ...` pairs
#[must_use]
pub fn format_library_hits(hits: &[LibraryHit]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }

    let blocks: Vec<String> = hits
        .iter()
        .take(limits::MAX_LIBRARY_SNIPPETS)
        .map(|hit| {
            let snippet: String = hit.text.chars().take(limits::LIBRARY_SNIPPET_CHARS).collect();
            format!("Source: {}\nSnippet: {snippet}...", hit.source)
        })
        .collect();
    Some(blocks.join("\n\n"))
}

// ============================================================================
// Gatherer
// ============================================================================

/// Collects retrieval context for a classified request
#[derive(Clone)]
pub struct ContextGatherer {
    web: Arc<dyn WebSearch>,
    library: Arc<dyn LibrarySearch>,
    quotas: Arc<QuotaTracker>,
}

impl ContextGatherer {
    /// Create a gatherer over the given backends
    #[must_use]
    pub fn new(
        web: Arc<dyn WebSearch>,
        library: Arc<dyn LibrarySearch>,
        quotas: Arc<QuotaTracker>,
    ) -> Self {
        Self {
            web,
            library,
            quotas,
        }
    }

    /// Gather context for `message`
    ///
    /// Never fails: every backend problem is logged and degraded.
    pub async fn gather(
        &self,
        mode: RequestMode,
        user_id: Uuid,
        message: &str,
        is_privileged: bool,
    ) -> GatheredContext {
        if !mode.wants_retrieval() {
            return GatheredContext::default();
        }

        let (web, library) = tokio::join!(
            self.gather_web(user_id, message, is_privileged),
            self.gather_library(user_id, message)
        );

        debug!(
            user.id = %user_id,
            mode = %mode,
            web = web.is_some(),
            library = library.is_some(),
            "Context gathered"
        );
        GatheredContext { web, library }
    }

    async fn gather_web(&self, user_id: Uuid, query: &str, is_privileged: bool) -> Option<String> {
        if !self.web.is_configured() {
            debug!("Web search not configured, skipping");
            return None;
        }

        match self
            .quotas
            .check_and_consume(user_id, QuotaAction::WebSearch, is_privileged)
            .await
        {
            Ok(QuotaDecision::Allowed) => {}
            Ok(QuotaDecision::Denied(_)) => return Some(messages::WEB_SEARCH_LIMIT_REACHED.to_owned()),
            Err(e) => {
                AppLogger::log_background_failure("web search quota", &e);
                return Some(messages::WEB_SEARCH_FAILED.to_owned());
            }
        }

        match self.web.search(query).await {
            Ok(results) if results.trim().is_empty() => {
                Some(messages::WEB_SEARCH_NO_RESULTS.to_owned())
            }
            Ok(results) => Some(results),
            Err(e) => {
                warn!(backend = self.web.name(), error = %e, "Web search failed");
                Some(messages::WEB_SEARCH_FAILED.to_owned())
            }
        }
    }

    async fn gather_library(&self, user_id: Uuid, query: &str) -> Option<String> {
        match self
            .library
            .search(user_id, query, limits::MAX_LIBRARY_SNIPPETS)
            .await
        {
            Ok(hits) => format_library_hits(&hits),
            Err(e) => {
                warn!(user.id = %user_id, error = %e, "Library search failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_augment_places_question_last() {
        let context = GatheredContext {
            web: Some("Title: A\nSnippet: B\nSource: C".to_owned()),
            library: Some("Source: notes.pdf\nSnippet: D...".to_owned()),
        };
        let question = "What is SQL injection and how is it mitigated?";
        let prompt = context.augment(question);

        let web_at = prompt.find(WEB_BLOCK_HEADING).unwrap();
        let library_at = prompt.find(LIBRARY_BLOCK_HEADING).unwrap();
        assert!(web_at < library_at);
        assert!(prompt.ends_with(question));
    }

    #[test]
    fn test_has_context() {
        assert!(!GatheredContext::default().has_context());
        let sentinel = GatheredContext {
            web: Some(messages::WEB_SEARCH_LIMIT_REACHED.to_owned()),
            library: None,
        };
        assert!(sentinel.has_context());
    }

    #[test]
    fn test_library_formatting_truncates_and_limits() {
        let long_text = "x".repeat(1_000);
        let hits: Vec<LibraryHit> = (0..5)
            .map(|i| LibraryHit {
                source: format!("doc{i}.pdf"),
                text: long_text.clone(),
            })
            .collect();

        let formatted = format_library_hits(&hits).unwrap();
        assert_eq!(formatted.matches("Source: ").count(), limits::MAX_LIBRARY_SNIPPETS);
        let first_snippet = formatted
            .lines()
            .find(|l| l.starts_with("Snippet: "))
            .unwrap();
        assert_eq!(
            first_snippet.len(),
            "Snippet: ".len() + limits::LIBRARY_SNIPPET_CHARS + "...".len()
        );
        assert!(format_library_hits(&[]).is_none());
    }
}
