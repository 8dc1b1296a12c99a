// ABOUTME: Maps an incoming chat message to a request mode
// ABOUTME: Ordered keyword rules with explicit-mode override and multimodal bypass
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Mode Classifier
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. greeting or closing at the start of the message: `chat`
//! 2. security vocabulary: `security_search`
//! 3. code-like tokens: `code_security_scan`
//! 4. lookup phrasing or a year: `web_search`
//! 5. more than six words: `web_search`
//! 6. anything else: `chat`
//!
//! Classification is a pure function of its inputs.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a message will be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Conversational reply with rolling history
    #[default]
    Chat,
    /// Answer grounded on a web search
    WebSearch,
    /// Security question grounded on web search and the user's library
    SecuritySearch,
    /// Review of submitted code for vulnerabilities
    CodeSecurityScan,
}

impl RequestMode {
    /// Wire and log name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::WebSearch => "web_search",
            Self::SecuritySearch => "security_search",
            Self::CodeSecurityScan => "code_security_scan",
        }
    }

    /// Parse a client-supplied mode name
    ///
    /// Returns `None` for unknown names, including voice hints, which are
    /// treated like the default `chat` mode.
    #[must_use]
    pub fn from_client_mode(mode: &str) -> Option<Self> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "chat" => Some(Self::Chat),
            "web_search" => Some(Self::WebSearch),
            "security_search" => Some(Self::SecuritySearch),
            "code_security_scan" => Some(Self::CodeSecurityScan),
            _ => None,
        }
    }

    /// Whether this mode gathers web and library context
    #[must_use]
    pub const fn wants_retrieval(self) -> bool {
        matches!(self, Self::WebSearch | Self::SecuritySearch)
    }
}

impl Display for RequestMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "thanks",
    "thank you",
    "thx",
    "bye",
    "goodbye",
    "good morning",
    "good evening",
    "good night",
];

const SECURITY_TERMS: &[&str] = &[
    "vulnerability",
    "vulnerabilities",
    "malware",
    "cybersecurity",
    "sql injection",
    "xss",
    "cross-site scripting",
    "mitigation",
    "mitigate",
    "exploit",
    "ransomware",
    "phishing",
    "cve-",
];

const LOOKUP_PHRASES: &[&str] = &["what is", "who is", "where is", "latest", "news"];

/// Word count above which a message is treated as an information request
const LONG_MESSAGE_WORDS: usize = 6;

static CODE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?mi)(^\s*def\s+\w+\s*\(|\bfunction\s*\w*\s*\(|^\s*class\s+\w+|^\s*(import|from)\s+[\w.]+|#include\s*<|\bselect\s+.+\s+from\s+\w+|=>\s*\{|\bconsole\.log\(|\bpublic\s+static\s+void\b)",
    )
    .ok()
});

static YEAR_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").ok());

static VIDEO_LINK_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)https?://(?:www\.|m\.)?(?:youtube\.com/(?:watch\?v=|shorts/|embed/)|youtu\.be/)[\w-]{6,}[^\s]*",
    )
    .ok()
});

/// Extract the first recognized video link from a message
#[must_use]
pub fn find_video_link(message: &str) -> Option<&str> {
    VIDEO_LINK_PATTERN
        .as_ref()
        .and_then(|re| re.find(message))
        .map(|m| m.as_str())
}

/// Classify a message
///
/// `explicit_mode` is the raw client hint. A known mode other than `chat` is
/// honored unless the message is multimodal. Multimodal messages always
/// classify as `chat` since they take the dedicated multimodal path.
#[must_use]
pub fn classify(message: &str, explicit_mode: Option<&str>, is_multimodal: bool) -> RequestMode {
    if is_multimodal {
        return RequestMode::Chat;
    }

    match explicit_mode.and_then(RequestMode::from_client_mode) {
        Some(mode) if mode != RequestMode::Chat => mode,
        _ => auto_classify(message),
    }
}

fn auto_classify(message: &str) -> RequestMode {
    let lowered = message.trim().to_lowercase();

    if starts_with_greeting(&lowered) {
        return RequestMode::Chat;
    }
    if SECURITY_TERMS.iter().any(|term| lowered.contains(term)) {
        return RequestMode::SecuritySearch;
    }
    if looks_like_code(message) {
        return RequestMode::CodeSecurityScan;
    }
    if LOOKUP_PHRASES.iter().any(|phrase| lowered.contains(phrase)) || mentions_year(&lowered) {
        return RequestMode::WebSearch;
    }
    if lowered.split_whitespace().count() > LONG_MESSAGE_WORDS {
        return RequestMode::WebSearch;
    }
    RequestMode::Chat
}

fn starts_with_greeting(lowered: &str) -> bool {
    GREETINGS.iter().any(|greeting| {
        lowered.strip_prefix(greeting).is_some_and(|rest| {
            rest.chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric())
        })
    })
}

fn looks_like_code(message: &str) -> bool {
    CODE_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}

fn mentions_year(lowered: &str) -> bool {
    YEAR_PATTERN.as_ref().is_some_and(|re| re.is_match(lowered))
}
