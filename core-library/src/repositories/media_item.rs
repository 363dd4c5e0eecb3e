//! Media item repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{MediaItem, MediaItemRow};
use crate::repositories::subtree_bounds;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

/// Media item repository interface for data access operations
#[async_trait]
pub trait MediaItemRepository: Send + Sync {
    /// Insert or replace items keyed by path, in a single transaction.
    ///
    /// # Errors
    /// Returns error if any item fails validation (nothing is written) or
    /// the database rejects the write.
    async fn upsert_many(&self, items: &[MediaItem]) -> Result<()>;

    /// Delete an item by path
    ///
    /// # Returns
    /// - `Ok(true)` if the item was deleted
    /// - `Ok(false)` if the item was not found
    async fn delete(&self, path: &str) -> Result<bool>;

    /// Find an item by its path
    async fn find_by_path(&self, path: &str) -> Result<Option<MediaItem>>;

    /// Items in `dir` and all of its descendants, ordered by path
    async fn find_under(&self, dir: &str) -> Result<Vec<MediaItem>>;

    /// Items whose parent is exactly `dir`, ordered by path
    async fn find_in_directory(&self, dir: &str) -> Result<Vec<MediaItem>>;

    /// Every catalogued item, ordered by path
    async fn find_all(&self) -> Result<Vec<MediaItem>>;

    /// Set the favorite flag
    ///
    /// # Returns
    /// `Ok(false)` if no item has that path
    async fn set_favorite(&self, path: &str, is_favorite: bool) -> Result<bool>;

    /// Count total items
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of MediaItemRepository
pub struct SqliteMediaItemRepository {
    pool: SqlitePool,
}

impl SqliteMediaItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn validate_item(item: &MediaItem) -> Result<()> {
        item.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "MediaItem".to_string(),
            message: msg,
        })
    }

    fn map_rows(rows: Vec<MediaItemRow>) -> Result<Vec<MediaItem>> {
        rows.into_iter().map(MediaItem::try_from).collect()
    }
}

const SELECT_COLUMNS: &str = "SELECT path, display_name, parent_path, size_bytes, modified_at, \
     taken_at, kind, video_duration_ms, is_favorite FROM media_items";

#[async_trait]
impl MediaItemRepository for SqliteMediaItemRepository {
    async fn upsert_many(&self, items: &[MediaItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        for item in items {
            Self::validate_item(item)?;
        }

        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO media_items (
                    path, display_name, parent_path, size_bytes, modified_at, taken_at,
                    kind, video_duration_ms, is_favorite
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(path) DO UPDATE SET
                    display_name = excluded.display_name,
                    parent_path = excluded.parent_path,
                    size_bytes = excluded.size_bytes,
                    modified_at = excluded.modified_at,
                    taken_at = excluded.taken_at,
                    kind = excluded.kind,
                    video_duration_ms = excluded.video_duration_ms,
                    is_favorite = excluded.is_favorite
                "#,
            )
            .bind(&item.path)
            .bind(&item.display_name)
            .bind(&item.parent_path)
            .bind(item.size_bytes as i64)
            .bind(item.modified_at)
            .bind(item.taken_at)
            .bind(item.kind.as_str())
            .bind(item.video_duration_ms.map(|d| d as i64))
            .bind(item.is_favorite)
            .execute(&mut *tx)
            .await
            .map_err(LibraryError::from_write)?;
        }
        tx.commit().await?;

        debug!(count = items.len(), "Upserted media items");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_items WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_path(&self, path: &str) -> Result<Option<MediaItem>> {
        let row = sqlx::query_as::<_, MediaItemRow>(&format!("{} WHERE path = ?", SELECT_COLUMNS))
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        row.map(MediaItem::try_from).transpose()
    }

    async fn find_under(&self, dir: &str) -> Result<Vec<MediaItem>> {
        let (exact, prefix) = subtree_bounds(dir);
        let rows = sqlx::query_as::<_, MediaItemRow>(&format!(
            "{} WHERE parent_path = ? OR substr(parent_path, 1, length(?)) = ? ORDER BY path ASC",
            SELECT_COLUMNS
        ))
        .bind(&exact)
        .bind(&prefix)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;
        Self::map_rows(rows)
    }

    async fn find_in_directory(&self, dir: &str) -> Result<Vec<MediaItem>> {
        let rows = sqlx::query_as::<_, MediaItemRow>(&format!(
            "{} WHERE parent_path = ? ORDER BY path ASC",
            SELECT_COLUMNS
        ))
        .bind(dir)
        .fetch_all(&self.pool)
        .await?;
        Self::map_rows(rows)
    }

    async fn find_all(&self) -> Result<Vec<MediaItem>> {
        let rows =
            sqlx::query_as::<_, MediaItemRow>(&format!("{} ORDER BY path ASC", SELECT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;
        Self::map_rows(rows)
    }

    async fn set_favorite(&self, path: &str, is_favorite: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE media_items SET is_favorite = ? WHERE path = ?")
            .bind(is_favorite)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
