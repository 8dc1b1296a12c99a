// ABOUTME: Conversation listing and deletion for the authenticated user
// ABOUTME: GET /api/chats and DELETE /api/chats/:conversation_id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::ConversationSummary;
use crate::errors::AppError;
use crate::resources::ServerResources;

/// Query parameters for listing conversations
#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    /// Maximum number of conversations to return
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    20
}

/// Response for listing conversations
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    /// Conversations, most recently updated first
    pub conversations: Vec<ConversationSummary>,
    /// Number of conversations returned
    pub total: usize,
}

/// Conversation routes handler
pub struct ConversationRoutes;

impl ConversationRoutes {
    /// Create conversation routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chats", get(Self::list_conversations))
            .route("/api/chats/:conversation_id", delete(Self::delete_conversation))
            .with_state(resources)
    }

    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListConversationsQuery>,
    ) -> Result<Json<ConversationListResponse>, AppError> {
        let user = resources.auth.authenticate(&headers).await?;
        let limit = query.limit.clamp(1, 100);
        let conversations = resources.database.list_conversations(user.id, limit).await?;

        Ok(Json(ConversationListResponse {
            total: conversations.len(),
            conversations,
        }))
    }

    async fn delete_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<StatusCode, AppError> {
        let user = resources.auth.authenticate(&headers).await?;
        if !resources
            .database
            .delete_conversation(&conversation_id, user.id)
            .await?
        {
            return Err(AppError::not_found(format!("Conversation {conversation_id}")));
        }

        info!(user.id = %user.id, conversation.id = %conversation_id, "Conversation deleted");
        Ok(StatusCode::NO_CONTENT)
    }
}
