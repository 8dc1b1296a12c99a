// ABOUTME: Primary/secondary provider pair built from environment configuration
// ABOUTME: Gemini fills the primary slot and Groq the secondary; either may be absent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Provider Set
//!
//! The dispatcher works with two slots. The primary slot is the multimodal
//! provider and the secondary slot is the fast text provider. A slot whose
//! API key is missing stays empty; the dispatcher records that as a
//! configuration failure instead of refusing to start.

use std::env;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{gemini, groq, GeminiProvider, GroqProvider, LlmProvider};
use crate::constants::env_config;

/// API keys and model names for both provider slots
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Gemini API key
    pub gemini_api_key: Option<String>,
    /// Groq API key
    pub groq_api_key: Option<String>,
    /// Model for the primary slot
    pub primary_model: String,
    /// Model for the secondary slot
    pub secondary_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            groq_api_key: None,
            primary_model: gemini::DEFAULT_MODEL.to_owned(),
            secondary_model: groq::DEFAULT_MODEL.to_owned(),
        }
    }
}

impl LlmConfig {
    /// Load LLM configuration from environment
    ///
    /// `GOOGLE_API_KEY` is accepted when `GEMINI_API_KEY` is not set.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: non_empty_var(env_config::GEMINI_API_KEY)
                .or_else(|| non_empty_var(env_config::GOOGLE_API_KEY)),
            groq_api_key: non_empty_var(env_config::GROQ_API_KEY),
            primary_model: env_var_or(env_config::PRIMARY_MODEL, gemini::DEFAULT_MODEL),
            secondary_model: env_var_or(env_config::SECONDARY_MODEL, groq::DEFAULT_MODEL),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("groq_api_key", &self.groq_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("primary_model", &self.primary_model)
            .field("secondary_model", &self.secondary_model)
            .finish()
    }
}

/// The two provider slots used by the dispatcher
#[derive(Clone, Default)]
pub struct ProviderSet {
    /// Primary multimodal provider
    pub primary: Option<Arc<dyn LlmProvider>>,
    /// Secondary text provider
    pub secondary: Option<Arc<dyn LlmProvider>>,
}

impl ProviderSet {
    /// Build both slots from explicit providers
    #[must_use]
    pub const fn new(
        primary: Option<Arc<dyn LlmProvider>>,
        secondary: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// Build providers for every slot that has an API key
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let primary = config.gemini_api_key.as_ref().map(|key| {
            Arc::new(GeminiProvider::new(key.clone()).with_default_model(&config.primary_model))
                as Arc<dyn LlmProvider>
        });
        let secondary = config.groq_api_key.as_ref().map(|key| {
            Arc::new(GroqProvider::new(key.clone()).with_default_model(&config.secondary_model))
                as Arc<dyn LlmProvider>
        });

        let set = Self { primary, secondary };
        set.log_configuration();
        set
    }

    /// Log which slots are filled
    pub fn log_configuration(&self) {
        for (slot, provider) in [("primary", &self.primary), ("secondary", &self.secondary)] {
            match provider {
                Some(p) => info!(
                    slot,
                    provider = p.name(),
                    model = p.default_model(),
                    "LLM provider configured"
                ),
                None => warn!(slot, "LLM provider not configured; requests will fall through"),
            }
        }
    }

    /// Whether at least one slot is usable
    #[must_use]
    pub const fn any_configured(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSet")
            .field("primary", &self.primary.as_ref().map(|p| p.name()))
            .field("secondary", &self.secondary.as_ref().map(|p| p.name()))
            .finish()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
