// ABOUTME: POST /chat handler running the full dispatch pipeline
// ABOUTME: Authenticates, gates quotas, classifies, gathers context, dispatches, logs and persists
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! Chat route
//!
//! Request flow: session authentication, attachment decoding, message quota,
//! voice quota for voice hints, document quota, mode classification,
//! context gathering, history lookup, model dispatch, fire-and-forget
//! interaction logging and finally persistence of the exchange.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::attachments::{self, Attachment};
use crate::classifier::{self, RequestMode};
use crate::constants::{dispatch as dispatch_limits, messages};
use crate::dispatch::{DispatchOutcome, DispatchRequest, ModelUsed};
use crate::errors::{AppError, AppResult};
use crate::interaction_log::InteractionLogEntry;
use crate::logging::AppLogger;
use crate::models::{ConversationTurn, User};
use crate::quota::{QuotaAction, QuotaDecision, QuotaDenial};
use crate::resources::ServerResources;

/// Mode hints sent by the voice interface
const VOICE_HINTS: &[&str] = &["voice_mode", "mic_input"];

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /chat`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatApiRequest {
    /// Message text
    #[serde(default)]
    pub text: String,
    /// Base64 file payload, optionally a data URL
    #[serde(default)]
    pub file_data: Option<String>,
    /// Declared MIME type of `file_data`
    #[serde(default)]
    pub file_type: Option<String>,
    /// Client mode hint
    #[serde(default)]
    pub mode: Option<String>,
    /// Neither read nor write conversation history
    #[serde(default)]
    pub is_temporary: bool,
    /// Conversation to continue
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl ChatApiRequest {
    fn is_voice(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|mode| VOICE_HINTS.contains(&mode))
    }

    fn file(&self) -> Option<&str> {
        self.file_data.as_deref().filter(|data| !data.trim().is_empty())
    }
}

/// Successful `POST /chat` response
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    /// Text shown to the user
    pub response: String,
    /// Provider slot that answered
    pub model: ModelUsed,
    /// Dispatch latency in milliseconds
    pub response_time: u64,
    /// Whether the fallback provider answered
    pub fallback_used: bool,
    /// Last provider failure, admins only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    /// Conversation the exchange was stored in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// 429 body for an exhausted consumable quota
#[derive(Debug, Serialize, Deserialize)]
pub struct QuotaExceededResponse {
    /// Human-readable reason
    pub error: String,
    /// Always true; the client offers an upgrade
    pub upgrade_required: bool,
    /// Usage in the current period
    pub current_usage: u32,
    /// Limit for the current period
    pub limit: u32,
}

impl From<QuotaDenial> for QuotaExceededResponse {
    fn from(denial: QuotaDenial) -> Self {
        Self {
            error: denial.reason,
            upgrade_required: true,
            current_usage: denial.current_usage,
            limit: denial.limit,
        }
    }
}

fn quota_exceeded(denial: QuotaDenial) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(QuotaExceededResponse::from(denial)),
    )
        .into_response()
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create the chat route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/chat", post(Self::chat))
            .with_state(resources)
    }

    #[instrument(skip_all, fields(user.id = tracing::field::Empty, chat.mode = tracing::field::Empty))]
    async fn chat(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<ChatApiRequest>,
    ) -> Result<Response, AppError> {
        let user = resources.auth.authenticate(&headers).await?;
        tracing::Span::current().record("user.id", user.id.to_string());
        let privileged = user.is_privileged();

        if request.text.trim().is_empty() && request.file().is_none() {
            return Err(AppError::invalid_input("Message text is required"));
        }

        let attachment = Self::decode_attachment(&request)?;

        let mut consumed = Vec::with_capacity(2);
        if let Some(denial) =
            Self::consume(&resources, &user, QuotaAction::Message).await?
        {
            return Ok(quota_exceeded(denial));
        }
        consumed.push(QuotaAction::Message);
        if request.is_voice() {
            if let Some(denial) =
                Self::consume(&resources, &user, QuotaAction::VoiceCommand).await?
            {
                Self::release(&resources, &user, &consumed).await;
                return Ok(quota_exceeded(denial));
            }
            consumed.push(QuotaAction::VoiceCommand);
        }
        if let Some(pages) = attachment.as_ref().and_then(Attachment::document_pages) {
            if let QuotaDecision::Denied(denial) = resources
                .quotas
                .check_and_consume_document(user.id, pages, privileged)
                .await?
            {
                Self::release(&resources, &user, &consumed).await;
                return Ok(quota_exceeded(denial));
            }
        }

        let video_link = classifier::find_video_link(&request.text).map(str::to_owned);
        let is_multimodal = attachment.is_some() || video_link.is_some();
        let mode = classifier::classify(&request.text, request.mode.as_deref(), is_multimodal);
        tracing::Span::current().record("chat.mode", mode.as_str());

        let context = if is_multimodal {
            crate::context::GatheredContext::default()
        } else {
            resources
                .gatherer
                .gather(mode, user.id, &request.text, privileged)
                .await
        };

        let conversation_id = if request.is_temporary {
            None
        } else {
            Self::resolve_conversation(&resources, user.id, request.conversation_id.as_deref())
                .await
        };
        let history = match &conversation_id {
            Some(id) => Self::load_history(&resources, id).await,
            None => Vec::new(),
        };

        let has_context = context.has_context();
        let dispatch_request = DispatchRequest {
            message: request.text.clone(),
            mode,
            context,
            history,
            attachment,
            video_link,
        };
        let outcome = resources.dispatcher.dispatch(&dispatch_request).await;

        Self::log_interaction(&resources, user.id, &request.text, mode, has_context, &outcome);

        let stored_in = if request.is_temporary || outcome.model == ModelUsed::Error {
            None
        } else {
            Self::persist_exchange(
                &resources,
                user.id,
                conversation_id.as_deref(),
                &request.text,
                &outcome.response,
            )
            .await
        };

        Ok(Json(ChatApiResponse {
            response: outcome.response,
            model: outcome.model,
            response_time: outcome.response_time_ms,
            fallback_used: outcome.fallback_used,
            error_details: outcome.error_details.filter(|_| user.is_admin),
            conversation_id: stored_in,
        })
        .into_response())
    }

    /// Consume one unit of `action`, returning the denial if refused
    async fn consume(
        resources: &ServerResources,
        user: &User,
        action: QuotaAction,
    ) -> AppResult<Option<QuotaDenial>> {
        match resources
            .quotas
            .check_and_consume(user.id, action, user.is_privileged())
            .await?
        {
            QuotaDecision::Allowed => Ok(None),
            QuotaDecision::Denied(denial) => Ok(Some(denial)),
        }
    }

    /// Return units consumed earlier in a request that was later refused
    async fn release(resources: &ServerResources, user: &User, consumed: &[QuotaAction]) {
        for &action in consumed {
            if let Err(e) = resources
                .quotas
                .release(user.id, action, user.is_privileged())
                .await
            {
                warn!(user.id = %user.id, action = action.as_str(), error = %e, "Failed to release quota unit");
            }
        }
    }

    fn decode_attachment(request: &ChatApiRequest) -> AppResult<Option<Attachment>> {
        let Some(data) = request.file() else {
            return Ok(None);
        };
        let file_type = request
            .file_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::invalid_input("fileType is required with fileData"))?;
        attachments::decode(data, file_type).map(Some)
    }

    /// Requested conversation if owned by the user, else the most recent one
    async fn resolve_conversation(
        resources: &ServerResources,
        user_id: Uuid,
        requested: Option<&str>,
    ) -> Option<String> {
        let lookup = match requested {
            Some(id) => resources
                .database
                .get_conversation(id, user_id)
                .await
                .map(|found| found.map(|c| c.id)),
            None => resources.database.latest_conversation_id(user_id).await,
        };

        lookup.unwrap_or_else(|e| {
            warn!(user.id = %user_id, error = %e, "Conversation lookup failed");
            None
        })
    }

    async fn load_history(resources: &ServerResources, conversation_id: &str) -> Vec<ConversationTurn> {
        resources
            .database
            .get_recent_turns(conversation_id, dispatch_limits::HISTORY_TURNS)
            .await
            .unwrap_or_else(|e| {
                warn!(conversation.id = %conversation_id, error = %e, "History load failed");
                Vec::new()
            })
    }

    fn log_interaction(
        resources: &ServerResources,
        user_id: Uuid,
        message: &str,
        mode: RequestMode,
        has_context: bool,
        outcome: &DispatchOutcome,
    ) {
        AppLogger::log_chat_outcome(
            user_id,
            mode.as_str(),
            outcome.model.as_str(),
            outcome.fallback_used,
            outcome.retry_count,
            outcome.response_time_ms,
        );

        resources.logger.log(InteractionLogEntry::new(
            user_id,
            message,
            &outcome.response,
            outcome.model,
            outcome.response_time_ms,
            mode,
            has_context,
            outcome.fallback_used,
            outcome.error_details.clone(),
            outcome.retry_count,
        ));
    }

    async fn persist_exchange(
        resources: &ServerResources,
        user_id: Uuid,
        conversation_id: Option<&str>,
        message: &str,
        response: &str,
    ) -> Option<String> {
        let user_text = if message.trim().is_empty() {
            messages::ATTACHMENT_ONLY_MESSAGE
        } else {
            message
        };

        match resources
            .database
            .append_exchange(user_id, conversation_id, user_text, response)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                AppLogger::log_background_failure("conversation persistence", &e);
                None
            }
        }
    }
}
