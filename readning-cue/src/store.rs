//! Idempotency and persistence gate
//!
//! A `chapters` row exists only for a page whose chunks were all written in
//! the same transaction. The page is complete when none of those chunks fell
//! back to silence. The workflow asks [`PageStore::ensure_generated`] before
//! doing any work for a page and skips the page entirely on a hit; an
//! incomplete page is generated again and its rows replaced.
//!
//! Every write goes through [`retry_on_lock`].

use crate::generation::ChunkArtifact;
use crate::retry::retry_on_lock;
use chrono::NaiveDateTime;
use readning_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// Book identity written alongside its pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
}

/// Chunk row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_index: i64,
    pub text_content: String,
    pub text_preview: String,
    pub emotion: String,
    pub audio_url: String,
    pub audio_duration: f64,
    pub success: bool,
    pub error: Option<String>,
}

/// A previously completed page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPage {
    pub book_id: String,
    pub page: u32,
    pub total_duration: f64,
    pub chunks: Vec<StoredChunk>,
}

/// One line of a book's page listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page: u32,
    pub total_duration: f64,
    pub chunk_count: i64,
    /// Chunks stored with the silent fallback
    pub failed_count: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Clone)]
pub struct PageStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl PageStore {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cached result for `(book_id, page)` if that page was completed before
    ///
    /// A stored page with any failed chunk is not complete and yields `None`.
    pub async fn ensure_generated(&self, book_id: &str, page: u32) -> Result<Option<CachedPage>> {
        let chapter = sqlx::query(
            r#"
            SELECT c.id, c.total_duration,
                   EXISTS (SELECT 1 FROM chunks k WHERE k.chapter_id = c.id AND k.success = 0) AS has_failures
            FROM chapters c
            WHERE c.book_id = ? AND c.page = ?
            "#,
        )
        .bind(book_id)
        .bind(page as i64)
        .fetch_optional(&self.pool)
        .await?;

        let Some(chapter) = chapter else {
            debug!(book_id, page, "Page not generated yet");
            return Ok(None);
        };

        if chapter.get::<bool, _>("has_failures") {
            info!(book_id, page, "Page has failed chunks, generating again");
            return Ok(None);
        }

        let chapter_id: i64 = chapter.get("id");
        let rows = sqlx::query(
            r#"
            SELECT chunk_index, text_content, text_preview, emotion,
                   audio_url, audio_duration, success, error
            FROM chunks
            WHERE chapter_id = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;

        let chunks = rows
            .iter()
            .map(|row| StoredChunk {
                chunk_index: row.get("chunk_index"),
                text_content: row.get("text_content"),
                text_preview: row.get("text_preview"),
                emotion: row.get("emotion"),
                audio_url: row.get("audio_url"),
                audio_duration: row.get("audio_duration"),
                success: row.get("success"),
                error: row.get("error"),
            })
            .collect();

        debug!(book_id, page, "Page already generated");
        Ok(Some(CachedPage {
            book_id: book_id.to_string(),
            page,
            total_duration: chapter.get("total_duration"),
            chunks,
        }))
    }

    /// Replace the page's chunks with `artifacts` in one transaction
    pub async fn persist(
        &self,
        book: &BookRecord,
        page: u32,
        artifacts: &[ChunkArtifact],
        total_duration: f64,
    ) -> Result<()> {
        retry_on_lock("page persist", self.max_lock_wait_ms, move || {
            self.persist_once(book, page, artifacts, total_duration)
        })
        .await?;

        info!(
            book_id = %book.id,
            page,
            chunks = artifacts.len(),
            total_duration,
            "Page persisted"
        );
        Ok(())
    }

    async fn persist_once(
        &self,
        book: &BookRecord,
        page: u32,
        artifacts: &[ChunkArtifact],
        total_duration: f64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO books (id, user_id, title)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                title = excluded.title,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&book.id)
        .bind(&book.user_id)
        .bind(&book.title)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO chapters (book_id, page, total_duration)
            VALUES (?, ?, ?)
            ON CONFLICT(book_id, page) DO UPDATE SET
                total_duration = excluded.total_duration,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&book.id)
        .bind(page as i64)
        .bind(total_duration)
        .execute(&mut *tx)
        .await?;

        let chapter_id: i64 = sqlx::query_scalar("SELECT id FROM chapters WHERE book_id = ? AND page = ?")
            .bind(&book.id)
            .bind(page as i64)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM chunks WHERE chapter_id = ?")
            .bind(chapter_id)
            .execute(&mut *tx)
            .await?;

        for artifact in artifacts {
            sqlx::query(
                r#"
                INSERT INTO chunks (
                    chapter_id, chunk_index, text_content, text_preview, emotion,
                    audio_url, audio_duration, success, error
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(chapter_id)
            .bind(artifact.chunk_index as i64)
            .bind(&artifact.full_text)
            .bind(&artifact.text_preview)
            .bind(&artifact.emotion)
            .bind(&artifact.artifact_url)
            .bind(artifact.duration as f64)
            .bind(artifact.success)
            .bind(&artifact.error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Completed pages of a book, in page order
    pub async fn list_pages(&self, book_id: &str) -> Result<Vec<PageSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT c.page, c.total_duration, c.created_at, COUNT(k.id) AS chunk_count,
                   COALESCE(SUM(CASE WHEN k.success = 0 THEN 1 ELSE 0 END), 0) AS failed_count
            FROM chapters c
            LEFT JOIN chunks k ON k.chapter_id = c.id
            WHERE c.book_id = ?
            GROUP BY c.id
            ORDER BY c.page
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PageSummary {
                page: row.get::<i64, _>("page") as u32,
                total_duration: row.get("total_duration"),
                chunk_count: row.get("chunk_count"),
                failed_count: row.get("failed_count"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
