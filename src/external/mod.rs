// ABOUTME: External API client modules (Serper web search, YouTube transcripts)
// ABOUTME: Concrete backends for the context gatherer and the multimodal path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! External API Clients

pub mod serper;
pub mod transcripts;

pub use serper::{DisabledWebSearch, SerperClient, SerperConfig};
pub use transcripts::{TranscriptFetcher, YouTubeTranscripts};
