// ABOUTME: Conversation storage with append-only turns
// ABOUTME: Reads the rolling history window and persists each completed exchange

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{ConversationTurn, TurnSender};

/// Characters of the first user message used as a conversation title
const TITLE_MAX_CHARS: usize = 60;

/// Database representation of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Conversation id
    pub id: String,
    /// Owner
    pub user_id: String,
    /// Title derived from the first message
    pub title: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

/// Summary of a conversation for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation id
    pub id: String,
    /// Title
    pub title: String,
    /// Number of stored turns
    pub turn_count: i64,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

impl Database {
    /// Create conversation and turn tables
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_conversations(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversation_turns (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender TEXT NOT NULL CHECK (sender IN ('user', 'assistant')),
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, updated_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_conversation ON conversation_turns(conversation_id, seq)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a conversation owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_conversation(
        &self,
        conversation_id: &str,
        user_id: Uuid,
    ) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, created_at, updated_at
            FROM conversations
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(conversation_id)
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        Ok(row.map(|r| ConversationRecord {
            id: r.get("id"),
            user_id: r.get("user_id"),
            title: r.get("title"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Most recently updated conversation of a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn latest_conversation_id(&self, user_id: Uuid) -> AppResult<Option<String>> {
        let row = sqlx::query(
            r"
            SELECT id FROM conversations
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("id")))
    }

    /// List a user's conversations, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r"
            SELECT c.id, c.title, c.updated_at, COUNT(t.seq) AS turn_count
            FROM conversations c
            LEFT JOIN conversation_turns t ON t.conversation_id = c.id
            WHERE c.user_id = $1
            GROUP BY c.id
            ORDER BY c.updated_at DESC
            LIMIT $2
            ",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| ConversationSummary {
                id: r.get("id"),
                title: r.get("title"),
                turn_count: r.get("turn_count"),
                updated_at: r.get("updated_at"),
            })
            .collect())
    }

    /// Delete a conversation and its turns
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete_conversation(&self, conversation_id: &str, user_id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
            .bind(conversation_id)
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() > 0 {
            sqlx::query("DELETE FROM conversation_turns WHERE conversation_id = $1")
                .bind(conversation_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Last `limit` turns of a conversation in chronological order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored sender is unknown
    pub async fn get_recent_turns(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> AppResult<Vec<ConversationTurn>> {
        let rows = sqlx::query(
            r"
            SELECT sender, text
            FROM conversation_turns
            WHERE conversation_id = $1
            ORDER BY seq DESC
            LIMIT $2
            ",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get recent turns: {e}")))?;

        // Reverse to get chronological order
        let mut turns = rows
            .into_iter()
            .map(|r| {
                let sender: String = r.get("sender");
                Ok(ConversationTurn {
                    sender: sender.parse::<TurnSender>()?,
                    text: r.get("text"),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        turns.reverse();

        Ok(turns)
    }

    /// Append a user message and the assistant reply
    ///
    /// Creates a new conversation when `conversation_id` is `None` or does not
    /// belong to the user. Returns the id the exchange was stored under.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails
    pub async fn append_exchange(
        &self,
        user_id: Uuid,
        conversation_id: Option<&str>,
        user_text: &str,
        assistant_text: &str,
    ) -> AppResult<String> {
        let existing = match conversation_id {
            Some(id) => self.get_conversation(id, user_id).await?.map(|c| c.id),
            None => None,
        };

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let id = if let Some(id) = existing {
            sqlx::query("UPDATE conversations SET updated_at = $1 WHERE id = $2")
                .bind(&now)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
            id
        } else {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                r"
                INSERT INTO conversations (id, user_id, title, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $4)
                ",
            )
            .bind(&id)
            .bind(user_id.to_string())
            .bind(Self::title_from(user_text))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;
            id
        };

        for turn in [
            ConversationTurn::user(user_text),
            ConversationTurn::assistant(assistant_text),
        ] {
            sqlx::query(
                r"
                INSERT INTO conversation_turns (conversation_id, sender, text, created_at)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(&id)
            .bind(turn.sender.as_str())
            .bind(&turn.text)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to append turn: {e}")))?;
        }

        tx.commit().await?;
        Ok(id)
    }

    fn title_from(text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return "New chat".to_owned();
        }
        trimmed.chars().take(TITLE_MAX_CHARS).collect()
    }
}
