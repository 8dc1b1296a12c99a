// ABOUTME: Route module organization for the Sofia AI HTTP API
// ABOUTME: Assembles chat, usage, conversation and health routes with tracing, CORS and body limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! Route module for the Sofia AI server
//!
//! Each domain module holds only route definitions and thin handlers that
//! delegate to the pipeline components in [`ServerResources`].

/// Chat dispatch route
pub mod chat;
/// Conversation list and delete routes
pub mod conversations;
/// Health check route
pub mod health;
/// Quota usage route
pub mod usage;

pub use chat::ChatRoutes;
pub use conversations::ConversationRoutes;
pub use health::HealthRoutes;
pub use usage::UsageRoutes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::resources::ServerResources;

/// Largest accepted request body; base64 attachments travel inline
pub const MAX_REQUEST_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Build the complete application router
pub fn build_router(resources: &Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config);

    Router::new()
        .merge(ChatRoutes::routes(Arc::clone(resources)))
        .merge(UsageRoutes::routes(Arc::clone(resources)))
        .merge(ConversationRoutes::routes(Arc::clone(resources)))
        .merge(HealthRoutes::routes(Arc::clone(resources)))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Configure CORS from `CORS_ALLOWED_ORIGINS`
///
/// An empty value or `*` allows any origin; otherwise the comma-separated
/// list is used as-is.
pub fn setup_cors(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
}
