// ABOUTME: Atomic quota counter updates on the users table
// ABOUTME: Implements QuotaStore with conditional UPDATE statements

use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::quota::{QuotaAction, QuotaStore, UsageSnapshot};

/// Counter column, period marker column, and any counter sharing the marker
const fn columns(action: QuotaAction) -> (&'static str, &'static str, Option<&'static str>) {
    match action {
        QuotaAction::Message => ("messages_used", "message_reset_month", None),
        QuotaAction::WebSearch => ("web_searches_used", "web_search_reset_day", None),
        QuotaAction::DocumentRead => (
            "document_reads_used",
            "document_reset_month",
            Some("document_pages_read"),
        ),
        QuotaAction::VoiceCommand => ("voice_commands_used", "voice_command_reset_day", None),
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl QuotaStore for Database {
    async fn reset_if_stale(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        period_id: &str,
    ) -> AppResult<()> {
        let (counter, marker, shared) = columns(action);
        let shared_reset = shared.map_or_else(String::new, |column| format!(", {column} = 0"));

        // Column names come from the fixed table above, never from input
        let sql = format!(
            "UPDATE users SET {counter} = 0{shared_reset}, {marker} = $1 \
             WHERE id = $2 AND ({marker} IS NULL OR {marker} <> $1)"
        );

        sqlx::query(&sql)
            .bind(period_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to reset {action} quota: {e}")))?;

        Ok(())
    }

    async fn try_increment(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        limit: u32,
    ) -> AppResult<Option<u32>> {
        let (counter, _, _) = columns(action);
        let sql = format!(
            "UPDATE users SET {counter} = {counter} + 1 \
             WHERE id = $1 AND {counter} < $2 RETURNING {counter}"
        );

        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(i64::from(limit))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to consume {action} quota: {e}")))?;

        row.map(|r| r.try_get::<i64, _>(0).map(to_u32))
            .transpose()
            .map_err(Into::into)
    }

    async fn try_consume_document(
        &self,
        user_id: Uuid,
        pages: u32,
        read_limit: u32,
        page_limit: u32,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET document_reads_used = document_reads_used + 1,
                document_pages_read = document_pages_read + $2
            WHERE id = $1
              AND document_reads_used < $3
              AND document_pages_read + $2 <= $4
            ",
        )
        .bind(user_id.to_string())
        .bind(i64::from(pages))
        .bind(i64::from(read_limit))
        .bind(i64::from(page_limit))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to consume document quota: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, user_id: Uuid, action: QuotaAction) -> AppResult<()> {
        let (counter, _, _) = columns(action);
        let sql = format!(
            "UPDATE users SET {counter} = {counter} - 1 WHERE id = $1 AND {counter} > 0"
        );

        sqlx::query(&sql)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to release {action} quota: {e}")))?;

        Ok(())
    }

    async fn usage_snapshot(&self, user_id: Uuid) -> AppResult<UsageSnapshot> {
        let row = sqlx::query(
            r"
            SELECT messages_used, message_reset_month,
                   web_searches_used, web_search_reset_day,
                   document_reads_used, document_pages_read, document_reset_month,
                   voice_commands_used, voice_command_reset_day
            FROM users WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {user_id}")))?;

        Ok(UsageSnapshot {
            messages_used: to_u32(row.try_get("messages_used")?),
            message_reset_month: row.try_get("message_reset_month")?,
            web_searches_used: to_u32(row.try_get("web_searches_used")?),
            web_search_reset_day: row.try_get("web_search_reset_day")?,
            document_reads_used: to_u32(row.try_get("document_reads_used")?),
            document_pages_read: to_u32(row.try_get("document_pages_read")?),
            document_reset_month: row.try_get("document_reset_month")?,
            voice_commands_used: to_u32(row.try_get("voice_commands_used")?),
            voice_command_reset_day: row.try_get("voice_command_reset_day")?,
        })
    }
}
