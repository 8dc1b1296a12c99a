// ABOUTME: Private document library storage and keyword search
// ABOUTME: Implements LibrarySearch with Unicode case-insensitive all-keywords matching

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use super::Database;
use crate::context::{LibraryHit, LibrarySearch};
use crate::errors::{AppError, AppResult};
use crate::models::LibraryItem;

impl Database {
    /// Create the library table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_library(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS library_items (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                filename TEXT NOT NULL,
                extracted_text TEXT NOT NULL,
                search_text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_library_user ON library_items(user_id, created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Store a document's extracted text in the owner's library
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn add_library_item(&self, item: &LibraryItem) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO library_items (id, user_id, filename, extracted_text, search_text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(item.id.to_string())
        .bind(item.user_id.to_string())
        .bind(&item.filename)
        .bind(&item.extracted_text)
        .bind(item.extracted_text.to_lowercase())
        .bind(item.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add library item: {e}")))?;

        Ok(())
    }

    /// Convenience constructor used by upload flows and tests
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn add_library_text(
        &self,
        user_id: Uuid,
        filename: &str,
        extracted_text: &str,
    ) -> AppResult<Uuid> {
        let item = LibraryItem {
            id: Uuid::new_v4(),
            user_id,
            filename: filename.to_owned(),
            extracted_text: extracted_text.to_owned(),
            created_at: Utc::now(),
        };
        self.add_library_item(&item).await?;
        Ok(item.id)
    }
}

#[async_trait]
impl LibrarySearch for Database {
    async fn search(&self, user_id: Uuid, query: &str, limit: usize) -> AppResult<Vec<LibraryHit>> {
        let keywords: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if keywords.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // SQLite's lower() folds ASCII only, so both sides use the Rust-folded text
        let clauses: String = (0..keywords.len())
            .map(|i| format!(" AND instr(search_text, ${}) > 0", i + 2))
            .collect();
        let sql = format!(
            "SELECT filename, extracted_text FROM library_items \
             WHERE user_id = $1{clauses} ORDER BY created_at DESC LIMIT {limit}"
        );

        let mut q = sqlx::query(&sql).bind(user_id.to_string());
        for keyword in &keywords {
            q = q.bind(keyword);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Library search failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| LibraryHit {
                source: r.get("filename"),
                text: r.get("extracted_text"),
            })
            .collect())
    }
}
