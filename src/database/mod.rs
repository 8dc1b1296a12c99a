// ABOUTME: SQLite storage for users, quotas, conversations, library items and interaction logs
// ABOUTME: Owns the connection pool and runs idempotent schema migrations at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Sofia AI

//! # Database Management
//!
//! A single [`Database`] handle wraps the `sqlx` pool. Each table family lives in
//! its own submodule as an `impl Database` block plus, where the request pipeline
//! needs a seam, a trait implementation (`QuotaStore`, `LibrarySearch`,
//! `InteractionSink`).

mod conversations;
mod interactions;
mod library;
mod quotas;
mod users;

pub use conversations::{ConversationRecord, ConversationSummary};
pub use interactions::InteractionRecord;

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::AppResult;

/// Database manager for every persistent table
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// In-memory URLs get a single long-lived connection so every handle sees
    /// the same database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened or a migration fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let pool = if Self::is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(database_url)
                .await?
        } else {
            // Ensure SQLite creates the database file if it doesn't exist
            let connection_options = if database_url.contains('?') {
                database_url.to_owned()
            } else {
                format!("{database_url}?mode=rwc")
            };
            SqlitePoolOptions::new()
                .max_connections(8)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&connection_options)
                .await?
        };

        let db = Self { pool };
        db.migrate().await?;

        info!(database.url = %Self::redact(database_url), "Database ready");
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any `CREATE TABLE` or `CREATE INDEX` statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        self.migrate_users().await?;
        self.migrate_conversations().await?;
        self.migrate_library().await?;
        self.migrate_interaction_logs().await?;

        Ok(())
    }

    fn is_memory_url(url: &str) -> bool {
        url.contains(":memory:") || url.contains("mode=memory")
    }

    fn redact(url: &str) -> &str {
        url.split('?').next().unwrap_or(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_migrates_twice() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in [
            "ai_interaction_logs",
            "conversation_turns",
            "conversations",
            "library_items",
            "users",
        ] {
            assert!(names.contains(&expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sofia.db");
        let url = format!("sqlite:{}", path.display());

        let _db = Database::new(&url).await.unwrap();
        assert!(path.exists());
    }
}
