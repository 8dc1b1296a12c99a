// ABOUTME: Fire-and-forget persistence of AI interactions
// ABOUTME: Bounded queue drained by a background task so logging never delays a chat reply
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Response Logger
//!
//! Request handlers hand an [`InteractionLogEntry`] to [`ResponseLogger::log`],
//! which only enqueues it. A worker task spawned with the logger writes entries
//! to an [`InteractionSink`]. A full queue or a failing sink drops the entry and
//! leaves a line in the operational log: delivery is at most once.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::classifier::RequestMode;
use crate::constants::interaction_log as limits;
use crate::dispatch::ModelUsed;
use crate::errors::AppResult;
use crate::logging::AppLogger;

/// One AI interaction as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionLogEntry {
    /// User the request came from
    pub user_id: Uuid,
    /// User message, truncated
    pub user_message: String,
    /// Model response, truncated
    pub ai_response: String,
    /// Which slot produced the response
    pub model_used: ModelUsed,
    /// Dispatch latency in milliseconds
    pub response_time_ms: u64,
    /// Mode the request was classified into
    pub request_mode: RequestMode,
    /// Whether retrieval context was supplied
    pub has_context: bool,
    /// Whether the fallback provider answered
    pub fallback_used: bool,
    /// Last provider failure, if any
    pub error_details: Option<String>,
    /// Failed primary attempts
    pub retry_count: u32,
    /// When the interaction happened
    pub timestamp: DateTime<Utc>,
}

impl InteractionLogEntry {
    /// Build an entry stamped now, truncating both texts
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        user_message: &str,
        ai_response: &str,
        model_used: ModelUsed,
        response_time_ms: u64,
        request_mode: RequestMode,
        has_context: bool,
        fallback_used: bool,
        error_details: Option<String>,
        retry_count: u32,
    ) -> Self {
        Self {
            user_id,
            user_message: truncate_chars(user_message, limits::USER_MESSAGE_MAX_CHARS),
            ai_response: truncate_chars(ai_response, limits::AI_RESPONSE_MAX_CHARS),
            model_used,
            response_time_ms,
            request_mode,
            has_context,
            fallback_used,
            error_details,
            retry_count,
            timestamp: Utc::now(),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Destination of interaction log entries
#[async_trait]
pub trait InteractionSink: Send + Sync {
    /// Persist one entry
    async fn record(&self, entry: &InteractionLogEntry) -> AppResult<()>;
}

/// Non-blocking handle to the background interaction writer
#[derive(Clone, Debug)]
pub struct ResponseLogger {
    sender: mpsc::Sender<InteractionLogEntry>,
}

impl ResponseLogger {
    /// Spawn the worker and return the handle used by request handlers
    ///
    /// The worker exits once every `ResponseLogger` clone is dropped and the
    /// queue is drained.
    #[must_use]
    pub fn spawn(sink: Arc<dyn InteractionSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<InteractionLogEntry>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                if let Err(e) = sink.record(&entry).await {
                    AppLogger::log_background_failure("interaction log", &e);
                }
            }
            debug!("Interaction log worker stopped");
        });

        (Self { sender }, worker)
    }

    /// Enqueue an entry without waiting
    pub fn log(&self, entry: InteractionLogEntry) {
        match self.sender.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                warn!(user.id = %entry.user_id, "Interaction log queue full, entry dropped");
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Interaction log worker gone, entry dropped");
            }
        }
    }
}
