// ABOUTME: Video transcript retrieval for multimodal chat requests
// ABOUTME: Resolves a YouTube link to its caption track and flattens it to plain text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! Transcript fetcher
//!
//! The watch page embeds a `captionTracks` list. The first track's `baseUrl`
//! serves timed-text XML, which is stripped to plain text. English tracks are
//! preferred when present.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::errors::{AppError, AppResult};

/// Turns a video link into transcript text
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Fetch the transcript of the video behind `video_url`
    async fn fetch(&self, video_url: &str) -> AppResult<String>;
}

static VIDEO_ID_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:v=|youtu\.be/|shorts/|embed/)([A-Za-z0-9_-]{6,})").ok()
});

static CAPTION_TRACKS_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""captionTracks":(\[.*?\])"#).ok());

static TEXT_NODE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<text[^>]*>(.*?)</text>").ok());

/// Extract the video id from a YouTube link
#[must_use]
pub fn video_id(video_url: &str) -> Option<&str> {
    VIDEO_ID_PATTERN
        .as_ref()?
        .captures(video_url)?
        .get(1)
        .map(|m| m.as_str())
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode", default)]
    language_code: String,
}

/// Transcript fetcher backed by the public YouTube watch page
#[derive(Debug, Clone)]
pub struct YouTubeTranscripts {
    http_client: reqwest::Client,
}

impl Default for YouTubeTranscripts {
    fn default() -> Self {
        Self::new()
    }
}

impl YouTubeTranscripts {
    /// Create a fetcher with a 15 second request timeout
    #[must_use]
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { http_client }
    }

    fn pick_track(watch_page: &str) -> AppResult<CaptionTrack> {
        let raw = CAPTION_TRACKS_PATTERN
            .as_ref()
            .and_then(|re| re.captures(watch_page))
            .and_then(|c| c.get(1))
            .ok_or_else(|| AppError::not_found("Video captions"))?;

        let mut tracks: Vec<CaptionTrack> = serde_json::from_str(raw.as_str()).map_err(|e| {
            AppError::external_service("youtube", format!("Unreadable caption list: {e}"))
        })?;

        let english = tracks
            .iter()
            .position(|t| t.language_code.starts_with("en"))
            .unwrap_or(0);
        if tracks.is_empty() {
            return Err(AppError::not_found("Video captions"));
        }
        Ok(tracks.swap_remove(english))
    }

    /// Flatten timed-text XML into one line of text
    fn flatten_timed_text(xml: &str) -> String {
        let Some(re) = TEXT_NODE_PATTERN.as_ref() else {
            return String::new();
        };
        re.captures_iter(xml)
            .filter_map(|c| c.get(1))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl TranscriptFetcher for YouTubeTranscripts {
    #[instrument(skip(self))]
    async fn fetch(&self, video_url: &str) -> AppResult<String> {
        let id = video_id(video_url)
            .ok_or_else(|| AppError::invalid_input("Unrecognized video link"))?;

        let watch_page = self
            .http_client
            .get(format!("https://www.youtube.com/watch?v={id}"))
            .header("Accept-Language", "en-US,en;q=0.8")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let track = Self::pick_track(&watch_page)?;
        let xml = self
            .http_client
            .get(track.base_url.replace("\\u0026", "&"))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let transcript = Self::flatten_timed_text(&xml);
        if transcript.is_empty() {
            return Err(AppError::not_found("Video transcript"));
        }

        debug!(video.id = %id, chars = transcript.len(), "Transcript fetched");
        Ok(transcript)
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;amp;", "&")
        .replace("&amp;#39;", "'")
        .replace("&amp;quot;", "\"")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_forms() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(
            video_id("https://youtube.com/shorts/abcDEF12345"),
            Some("abcDEF12345")
        );
        assert_eq!(video_id("https://example.com/video"), None);
    }

    #[test]
    fn test_pick_prefers_english() {
        let page = r#"var x = {"captionTracks":[{"baseUrl":"https://a/de","languageCode":"de"},{"baseUrl":"https://a/en","languageCode":"en"}],"audioTracks":[]};"#;
        let track = YouTubeTranscripts::pick_track(page).unwrap();
        assert_eq!(track.base_url, "https://a/en");

        assert!(YouTubeTranscripts::pick_track("<html>no captions</html>").is_err());
    }

    #[test]
    fn test_flatten_timed_text() {
        let xml = r#"<?xml version="1.0"?><transcript><text start="0" dur="1">Hello &amp;amp; welcome</text><text start="1" dur="2">it&amp;#39;s
fine</text></transcript>"#;
        assert_eq!(
            YouTubeTranscripts::flatten_timed_text(xml),
            "Hello & welcome it's fine"
        );
    }
}
