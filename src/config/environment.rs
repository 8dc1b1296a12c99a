// ABOUTME: Environment-based server configuration
// ABOUTME: Composes listen port, storage, provider, quota and dispatch settings at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{env_config, interaction_log, ports};
use crate::dispatch::DispatchConfig;
use crate::errors::{AppError, AppResult};
use crate::external::SerperConfig;
use crate::llm::LlmConfig;
use crate::quota::QuotaPolicy;

/// Default SQLite location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/sofia.db";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Automated tests
    Testing,
    /// Production deployment
    Production,
}

impl Environment {
    /// Parse leniently, defaulting to development
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Whether this is a production deployment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "testing" | "test" => Ok(Self::Testing),
            "production" | "prod" => Ok(Self::Production),
            other => Err(AppError::config(format!("Unknown environment '{other}'"))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        })
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// SQLite URL
    pub database_url: String,
    /// Deployment environment
    pub environment: Environment,
    /// Allowed CORS origins, comma-separated or `*`
    pub cors_allowed_origins: String,
    /// Model provider keys and model names
    pub llm: LlmConfig,
    /// Web search settings, absent without an API key
    pub web_search: Option<SerperConfig>,
    /// Usage limits
    pub quotas: QuotaPolicy,
    /// Retry and provider ordering
    pub dispatch: DispatchConfig,
    /// Bound of the interaction log queue
    pub interaction_log_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: ports::DEFAULT_HTTP_PORT,
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            environment: Environment::default(),
            cors_allowed_origins: "*".to_owned(),
            llm: LlmConfig::default(),
            web_search: None,
            quotas: QuotaPolicy::default(),
            dispatch: DispatchConfig::default(),
            interaction_log_capacity: interaction_log::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a port or capacity value is set but not a valid number
    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            http_port: http_port()?,
            database_url: env_var_or(env_config::DATABASE_URL, DEFAULT_DATABASE_URL),
            environment: Environment::from_str_or_default(&env_var_or(
                env_config::ENVIRONMENT,
                "development",
            )),
            cors_allowed_origins: env_var_or(env_config::CORS_ALLOWED_ORIGINS, "*"),
            llm: LlmConfig::from_env(),
            web_search: env::var(env_config::SERPER_API_KEY)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .map(SerperConfig::new),
            quotas: QuotaPolicy::from_env(),
            dispatch: DispatchConfig::from_env(),
            interaction_log_capacity: env_var_or(
                env_config::INTERACTION_LOG_CAPACITY,
                &interaction_log::DEFAULT_QUEUE_CAPACITY.to_string(),
            )
            .parse()
            .map_err(|e| {
                AppError::config(format!(
                    "Invalid {}: {e}",
                    env_config::INTERACTION_LOG_CAPACITY
                ))
            })?,
        };

        config.log_summary();
        Ok(config)
    }

    /// Log the effective configuration without secrets
    pub fn log_summary(&self) {
        info!(
            http.port = self.http_port,
            environment = %self.environment,
            primary.configured = self.llm.gemini_api_key.is_some(),
            secondary.configured = self.llm.groq_api_key.is_some(),
            web_search.configured = self.web_search.is_some(),
            dispatch.max_attempts = self.dispatch.max_primary_attempts,
            dispatch.backoff_ms = u64::try_from(self.dispatch.backoff_base.as_millis()).unwrap_or(u64::MAX),
            "Configuration loaded"
        );
    }
}

/// `PORT` takes precedence over `HTTP_PORT`
fn http_port() -> AppResult<u16> {
    let raw = env::var(env_config::PORT)
        .or_else(|_| env::var(env_config::HTTP_PORT))
        .ok();
    raw.map_or(Ok(ports::DEFAULT_HTTP_PORT), |value| {
        value
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid port '{value}': {e}")))
    })
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::from_str_or_default("PROD"), Environment::Production);
        assert_eq!(Environment::from_str_or_default("test"), Environment::Testing);
        assert_eq!(Environment::from_str_or_default("staging"), Environment::Development);
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.http_port, 5000);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.web_search.is_none());
        assert_eq!(config.interaction_log_capacity, 1_024);
    }
}
