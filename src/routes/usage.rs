// ABOUTME: GET /api/usage handler reporting quota counters and limits
// ABOUTME: Read-only view; never consumes quota or resets counters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};

use crate::errors::AppError;
use crate::quota::UsageReport;
use crate::resources::ServerResources;

/// Usage routes handler
pub struct UsageRoutes;

impl UsageRoutes {
    /// Create usage routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/usage", get(Self::usage))
            .with_state(resources)
    }

    async fn usage(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<UsageReport>, AppError> {
        let user = resources.auth.authenticate(&headers).await?;
        let report = resources
            .quotas
            .usage_report(user.id, user.is_privileged())
            .await?;
        Ok(Json(report))
    }
}
