// ABOUTME: User record storage and session lookup
// ABOUTME: The users row also carries quota counters and their period markers

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::User;

impl Database {
    /// Create the users table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_users(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                display_name TEXT,
                session_id TEXT UNIQUE,
                is_admin BOOLEAN NOT NULL DEFAULT 0,
                is_premium BOOLEAN NOT NULL DEFAULT 0,
                is_verified BOOLEAN NOT NULL DEFAULT 0,
                messages_used INTEGER NOT NULL DEFAULT 0,
                message_reset_month TEXT,
                web_searches_used INTEGER NOT NULL DEFAULT 0,
                web_search_reset_day TEXT,
                document_reads_used INTEGER NOT NULL DEFAULT 0,
                document_pages_read INTEGER NOT NULL DEFAULT 0,
                document_reset_month TEXT,
                voice_commands_used INTEGER NOT NULL DEFAULT 0,
                voice_command_reset_day TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_session_id ON users(session_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a new user with zeroed quota counters
    ///
    /// # Errors
    ///
    /// Returns an error if the email or session id is already taken
    pub async fn create_user(&self, user: &User) -> AppResult<Uuid> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, session_id, is_admin, is_premium, is_verified, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.session_id)
        .bind(user.is_admin)
        .bind(user.is_premium)
        .bind(user.is_verified)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create user: {e}")))?;

        Ok(user.id)
    }

    /// Get a user by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is malformed
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, email, display_name, session_id, is_admin, is_premium, is_verified, created_at
            FROM users WHERE id = $1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    /// Get the user owning an active session
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is malformed
    pub async fn get_user_by_session(&self, session_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, email, display_name, session_id, is_admin, is_premium, is_verified, created_at
            FROM users WHERE session_id = $1
            ",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    /// Replace the active session of a user, `None` logs them out
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_session_id(&self, user_id: Uuid, session_id: Option<&str>) -> AppResult<()> {
        sqlx::query("UPDATE users SET session_id = $1 WHERE id = $2")
            .bind(session_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_user(row: &SqliteRow) -> AppResult<User> {
        let id: String = row.try_get("id")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(User {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("Invalid user id {id}: {e}")))?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            session_id: row.try_get("session_id")?,
            is_admin: row.try_get("is_admin")?,
            is_premium: row.try_get("is_premium")?,
            is_verified: row.try_get("is_verified")?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| AppError::database(format!("Invalid created_at: {e}")))?,
        })
    }
}
