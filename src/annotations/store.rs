//! Annotation persistence
//!
//! [`AnnotationStore`] is the seam to the persistence collaborator. Every
//! call returns the post-write state, so the caller that issued a write never
//! observes a stale record. Other observers re-fetch.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::types::{Bookmark, Highlight, HighlightColor, HighlightUpdate, NewHighlight};
use crate::error::{ReaderError, Result};
use crate::position::{Position, PositionRange};

/// Per-book annotation totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationCounts {
    pub bookmarks: i64,
    pub highlights: i64,
}

/// Scoped CRUD for bookmarks and highlights
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// All bookmarks of a book. Order is not meaningful; sort by position.
    async fn list_bookmarks(&self, book_id: &str) -> Result<Vec<Bookmark>>;

    /// Persist a bookmark. Dedup is the caller's job (see `bookmarks::toggle_bookmark`).
    async fn create_bookmark(
        &self,
        book_id: &str,
        position: &Position,
        excerpt: &str,
    ) -> Result<Bookmark>;

    /// Returns `false` when no such bookmark exists
    async fn delete_bookmark(&self, id: &str) -> Result<bool>;

    async fn list_highlights(&self, book_id: &str) -> Result<Vec<Highlight>>;

    async fn get_highlight(&self, id: &str) -> Result<Option<Highlight>>;

    async fn find_highlight_by_range(
        &self,
        book_id: &str,
        range: &PositionRange,
    ) -> Result<Option<Highlight>>;

    async fn create_highlight(&self, book_id: &str, highlight: NewHighlight) -> Result<Highlight>;

    /// Apply a partial update and refresh `updated_at`.
    /// Fails with `NotFound` for an unknown id.
    async fn update_highlight(&self, id: &str, update: &HighlightUpdate) -> Result<Highlight>;

    /// Returns `false` when no such highlight exists
    async fn delete_highlight(&self, id: &str) -> Result<bool>;

    /// Substring search over highlight text and notes
    async fn search_highlights(&self, book_id: &str, query: &str) -> Result<Vec<Highlight>>;

    async fn count_for_book(&self, book_id: &str) -> Result<AnnotationCounts>;

    /// Remove every annotation of a book. Called when the book record is deleted.
    async fn delete_for_book(&self, book_id: &str) -> Result<u64>;
}

/// SQLite-backed annotation store
#[derive(Clone)]
pub struct SqliteAnnotationStore {
    pool: SqlitePool,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn like_pattern(query: &str) -> String {
    let mut pattern = String::from("%");
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

impl SqliteAnnotationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and initialize the schema
    pub async fn open(database_url: &str) -> Result<Self> {
        Ok(Self::new(crate::db::create_pool(database_url).await?))
    }

    /// Store backed by a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(crate::db::create_memory_pool().await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn get_bookmark(&self, id: &str) -> Result<Option<Bookmark>> {
        let row = sqlx::query_as::<_, BookmarkRow>(
            r#"
            SELECT id, book_id, position, excerpt, created_at
            FROM bookmarks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BookmarkRow::into_bookmark).transpose()
    }
}

#[async_trait]
impl AnnotationStore for SqliteAnnotationStore {
    async fn list_bookmarks(&self, book_id: &str) -> Result<Vec<Bookmark>> {
        let rows = sqlx::query_as::<_, BookmarkRow>(
            r#"
            SELECT id, book_id, position, excerpt, created_at
            FROM bookmarks
            WHERE book_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BookmarkRow::into_bookmark).collect()
    }

    async fn create_bookmark(
        &self,
        book_id: &str,
        position: &Position,
        excerpt: &str,
    ) -> Result<Bookmark> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO bookmarks (id, book_id, position, excerpt, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(book_id)
        .bind(position.as_str())
        .bind(excerpt)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        tracing::debug!("Created bookmark {} in book {} at {}", id, book_id, position);

        self.get_bookmark(&id)
            .await?
            .ok_or_else(|| ReaderError::NotFound(format!("bookmark {}", id)))
    }

    async fn delete_bookmark(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_highlights(&self, book_id: &str) -> Result<Vec<Highlight>> {
        let rows = sqlx::query_as::<_, HighlightRow>(
            r#"
            SELECT id, book_id, start_position, end_position, text, color, note,
                   created_at, updated_at
            FROM highlights
            WHERE book_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HighlightRow::into_highlight).collect()
    }

    async fn get_highlight(&self, id: &str) -> Result<Option<Highlight>> {
        let row = sqlx::query_as::<_, HighlightRow>(
            r#"
            SELECT id, book_id, start_position, end_position, text, color, note,
                   created_at, updated_at
            FROM highlights
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HighlightRow::into_highlight).transpose()
    }

    async fn find_highlight_by_range(
        &self,
        book_id: &str,
        range: &PositionRange,
    ) -> Result<Option<Highlight>> {
        let row = sqlx::query_as::<_, HighlightRow>(
            r#"
            SELECT id, book_id, start_position, end_position, text, color, note,
                   created_at, updated_at
            FROM highlights
            WHERE book_id = ? AND start_position = ? AND end_position = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(book_id)
        .bind(range.start.as_str())
        .bind(range.end.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(HighlightRow::into_highlight).transpose()
    }

    async fn create_highlight(&self, book_id: &str, highlight: NewHighlight) -> Result<Highlight> {
        let id = Uuid::new_v4().to_string();
        let now = timestamp(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO highlights (id, book_id, start_position, end_position, text, color, note, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(book_id)
        .bind(highlight.range.start.as_str())
        .bind(highlight.range.end.as_str())
        .bind(&highlight.text)
        .bind(highlight.color.as_str())
        .bind(&highlight.note)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Created {} highlight {} in book {}", highlight.color, id, book_id);

        self.get_highlight(&id)
            .await?
            .ok_or_else(|| ReaderError::NotFound(format!("highlight {}", id)))
    }

    async fn update_highlight(&self, id: &str, update: &HighlightUpdate) -> Result<Highlight> {
        let mut highlight = self
            .get_highlight(id)
            .await?
            .ok_or_else(|| ReaderError::NotFound(format!("highlight {}", id)))?;

        if update.is_empty() {
            return Ok(highlight);
        }

        if let Some(color) = update.color {
            highlight.color = color;
        }
        if let Some(note) = &update.note {
            highlight.note = note.clone();
        }

        let result = sqlx::query(
            r#"
            UPDATE highlights SET color = ?, note = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(highlight.color.as_str())
        .bind(&highlight.note)
        .bind(timestamp(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ReaderError::NotFound(format!("highlight {}", id)));
        }

        self.get_highlight(id)
            .await?
            .ok_or_else(|| ReaderError::NotFound(format!("highlight {}", id)))
    }

    async fn delete_highlight(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM highlights WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn search_highlights(&self, book_id: &str, query: &str) -> Result<Vec<Highlight>> {
        let pattern = like_pattern(query);

        let rows = sqlx::query_as::<_, HighlightRow>(
            r#"
            SELECT id, book_id, start_position, end_position, text, color, note,
                   created_at, updated_at
            FROM highlights
            WHERE book_id = ?
              AND (text LIKE ? ESCAPE '\' OR note LIKE ? ESCAPE '\')
            ORDER BY created_at ASC
            "#,
        )
        .bind(book_id)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HighlightRow::into_highlight).collect()
    }

    async fn count_for_book(&self, book_id: &str) -> Result<AnnotationCounts> {
        let (bookmarks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookmarks WHERE book_id = ?")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        let (highlights,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM highlights WHERE book_id = ?")
                .bind(book_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(AnnotationCounts {
            bookmarks,
            highlights,
        })
    }

    async fn delete_for_book(&self, book_id: &str) -> Result<u64> {
        let bookmarks = sqlx::query("DELETE FROM bookmarks WHERE book_id = ?")
            .bind(book_id)
            .execute(&self.pool)
            .await?;
        let highlights = sqlx::query("DELETE FROM highlights WHERE book_id = ?")
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        let removed = bookmarks.rows_affected() + highlights.rows_affected();
        tracing::info!("Removed {} annotations for book {}", removed, book_id);

        Ok(removed)
    }
}

/// Internal row type for bookmark queries
#[derive(sqlx::FromRow)]
struct BookmarkRow {
    id: String,
    book_id: String,
    position: String,
    excerpt: String,
    created_at: String,
}

impl BookmarkRow {
    fn into_bookmark(self) -> Result<Bookmark> {
        Ok(Bookmark {
            id: self.id,
            book_id: self.book_id,
            position: Position::new(self.position),
            excerpt: self.excerpt,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Internal row type for highlight queries
#[derive(sqlx::FromRow)]
struct HighlightRow {
    id: String,
    book_id: String,
    start_position: String,
    end_position: String,
    text: String,
    color: String,
    note: Option<String>,
    created_at: String,
    updated_at: String,
}

impl HighlightRow {
    fn into_highlight(self) -> Result<Highlight> {
        let color = self.color.parse::<HighlightColor>().unwrap_or_else(|e| {
            tracing::warn!("Highlight {}: {}, using default", self.id, e);
            HighlightColor::default()
        });

        Ok(Highlight {
            range: PositionRange::new(self.start_position, self.end_position),
            id: self.id,
            book_id: self.book_id,
            text: self.text,
            color,
            note: self.note,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}
