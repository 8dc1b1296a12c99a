// ABOUTME: Fixed user-facing response strings
// ABOUTME: Apologies and sentinels that never depend on provider output
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

/// Returned when every configured model failed
pub const ALL_MODELS_FAILED: &str =
    "Sorry, I'm having trouble reaching my AI models right now. Please try again in a moment.";

/// Returned when a video transcript could not be fetched
pub const TRANSCRIPT_UNAVAILABLE: &str =
    "Sorry, I couldn't retrieve the transcript for that video. It may not have captions available.";

/// Web context placeholder when the daily search quota is exhausted
pub const WEB_SEARCH_LIMIT_REACHED: &str =
    "Daily web search limit reached. Upgrade to premium for unlimited web searches.";

/// Web context placeholder when no search backend is configured
pub const WEB_SEARCH_NOT_CONFIGURED: &str = "Web search is not configured.";

/// Stored as the user turn when a file was sent without text
pub const ATTACHMENT_ONLY_MESSAGE: &str = "[Attachment]";

/// Web context placeholder when the search backend failed
pub const WEB_SEARCH_FAILED: &str = "Web search is temporarily unavailable.";

/// Web context placeholder when a search returned nothing
pub const WEB_SEARCH_NO_RESULTS: &str = "No web results found.";
