// ABOUTME: Persistence for AI interaction log entries
// ABOUTME: Implements InteractionSink for the background response logger

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::interaction_log::{InteractionLogEntry, InteractionSink};

/// A stored interaction, as read back for inspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Row id
    pub id: i64,
    /// User the request came from
    pub user_id: String,
    /// Truncated user message
    pub user_message: String,
    /// Truncated model response
    pub ai_response: String,
    /// `gemini`, `groq` or `error`
    pub model_used: String,
    /// Dispatch latency in milliseconds
    pub response_time_ms: i64,
    /// Mode the request was classified into
    pub request_mode: String,
    /// Whether retrieval context was supplied
    pub has_context: bool,
    /// Whether the fallback provider answered
    pub fallback_used: bool,
    /// Last provider failure, if any
    pub error_details: Option<String>,
    /// Failed primary attempts
    pub retry_count: i64,
    /// When the interaction happened (RFC 3339)
    pub timestamp: String,
}

impl Database {
    /// Create the interaction log table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_interaction_logs(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS ai_interaction_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                user_message TEXT NOT NULL,
                ai_response TEXT NOT NULL,
                model_used TEXT NOT NULL,
                response_time_ms INTEGER NOT NULL,
                request_mode TEXT NOT NULL,
                has_context BOOLEAN NOT NULL,
                fallback_used BOOLEAN NOT NULL,
                error_details TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                timestamp TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_interactions_user ON ai_interaction_logs(user_id, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent interactions of a user, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn recent_interactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<InteractionRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, user_message, ai_response, model_used, response_time_ms,
                   request_mode, has_context, fallback_used, error_details, retry_count, timestamp
            FROM ai_interaction_logs
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2
            ",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to read interaction logs: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| InteractionRecord {
                id: r.get("id"),
                user_id: r.get("user_id"),
                user_message: r.get("user_message"),
                ai_response: r.get("ai_response"),
                model_used: r.get("model_used"),
                response_time_ms: r.get("response_time_ms"),
                request_mode: r.get("request_mode"),
                has_context: r.get("has_context"),
                fallback_used: r.get("fallback_used"),
                error_details: r.get("error_details"),
                retry_count: r.get("retry_count"),
                timestamp: r.get("timestamp"),
            })
            .collect())
    }
}

#[async_trait]
impl InteractionSink for Database {
    async fn record(&self, entry: &InteractionLogEntry) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO ai_interaction_logs (
                user_id, user_message, ai_response, model_used, response_time_ms,
                request_mode, has_context, fallback_used, error_details, retry_count, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(entry.user_id.to_string())
        .bind(&entry.user_message)
        .bind(&entry.ai_response)
        .bind(entry.model_used.as_str())
        .bind(i64::try_from(entry.response_time_ms).unwrap_or(i64::MAX))
        .bind(entry.request_mode.as_str())
        .bind(entry.has_context)
        .bind(entry.fallback_used)
        .bind(&entry.error_details)
        .bind(i64::from(entry.retry_count))
        .bind(entry.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to write interaction log: {e}")))?;

        Ok(())
    }
}
