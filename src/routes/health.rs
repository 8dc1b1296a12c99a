// ABOUTME: Health check route for service monitoring
// ABOUTME: Reports liveness, configured providers and optional live provider probes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! Health check routes
//!
//! `GET /health` answers without touching any upstream. `GET /health?deep=true`
//! additionally asks each configured provider for a health check.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::llm::LlmProvider;
use crate::resources::ServerResources;

/// Query parameters for the health endpoint
#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    /// Probe configured providers
    #[serde(default)]
    pub deep: bool,
}

/// One provider slot in the health report
#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Whether an API key is configured
    pub configured: bool,
    /// Provider name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Result of a live probe, only for deep checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
}

/// Health report
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `healthy` when the server answers
    pub status: String,
    /// Report time (RFC 3339)
    pub timestamp: String,
    /// Deployment environment
    pub environment: String,
    /// Primary slot
    pub primary: ProviderHealth,
    /// Secondary slot
    pub secondary: ProviderHealth,
    /// Whether web search is configured
    pub web_search: bool,
}

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::health))
            .with_state(resources)
    }

    async fn health(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<HealthQuery>,
    ) -> Json<HealthResponse> {
        let providers = resources.dispatcher.providers();
        let (primary, secondary) = tokio::join!(
            Self::probe(providers.primary.as_deref(), query.deep),
            Self::probe(providers.secondary.as_deref(), query.deep)
        );

        Json(HealthResponse {
            status: "healthy".to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            environment: resources.config.environment.to_string(),
            primary,
            secondary,
            web_search: resources.config.web_search.is_some(),
        })
    }

    async fn probe(provider: Option<&dyn LlmProvider>, deep: bool) -> ProviderHealth {
        let Some(provider) = provider else {
            return ProviderHealth {
                configured: false,
                provider: None,
                model: None,
                healthy: None,
            };
        };

        let healthy = if deep {
            Some(provider.health_check().await.unwrap_or(false))
        } else {
            None
        };

        ProviderHealth {
            configured: true,
            provider: Some(provider.display_name().to_owned()),
            model: Some(provider.default_model().to_owned()),
            healthy,
        }
    }
}
