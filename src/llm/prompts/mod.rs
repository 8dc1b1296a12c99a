// ABOUTME: System prompts for LLM interactions loaded at compile time
// ABOUTME: Persona, code review, grounded answer and video summary prompts for Sofia
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # System Prompts
//!
//! Prompts are loaded at compile time from markdown files for easy maintenance.

use crate::classifier::RequestMode;

/// Default conversational persona
pub const SOFIA_SYSTEM_PROMPT: &str = include_str!("sofia_system.md");

/// Security review of submitted code
pub const CODE_REVIEW_PROMPT: &str = include_str!("code_review.md");

/// Answering from gathered web and library context
pub const GROUNDED_ANSWER_PROMPT: &str = include_str!("grounded_answer.md");

/// Summarizing a shared video from its transcript
pub const VIDEO_SUMMARY_PROMPT: &str = include_str!("video_summary.md");

/// Pick the system prompt for a request
#[must_use]
pub const fn system_prompt_for(mode: RequestMode, has_context: bool) -> &'static str {
    match mode {
        RequestMode::CodeSecurityScan => CODE_REVIEW_PROMPT,
        _ if has_context => GROUNDED_ANSWER_PROMPT,
        _ => SOFIA_SYSTEM_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_selection() {
        assert_eq!(
            system_prompt_for(RequestMode::CodeSecurityScan, true),
            CODE_REVIEW_PROMPT
        );
        assert_eq!(
            system_prompt_for(RequestMode::SecuritySearch, true),
            GROUNDED_ANSWER_PROMPT
        );
        assert_eq!(system_prompt_for(RequestMode::WebSearch, false), SOFIA_SYSTEM_PROMPT);
        assert!(SOFIA_SYSTEM_PROMPT.contains("Sofia"));
    }
}
