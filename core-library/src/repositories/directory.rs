//! Directory aggregate repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{DirectoryAggregate, DirectoryRow};
use crate::repositories::subtree_bounds;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Directory repository interface
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Insert or replace the aggregate for `aggregate.path`
    async fn upsert(&self, aggregate: &DirectoryAggregate) -> Result<()>;

    /// Find the aggregate for a directory
    async fn find_by_path(&self, path: &str) -> Result<Option<DirectoryAggregate>>;

    /// All aggregates ordered by path
    async fn find_all(&self) -> Result<Vec<DirectoryAggregate>>;

    /// Aggregates for `dir` and every directory below it
    async fn find_under(&self, dir: &str) -> Result<Vec<DirectoryAggregate>>;

    /// Delete an aggregate
    ///
    /// # Returns
    /// `Ok(false)` if there was nothing to delete
    async fn delete(&self, path: &str) -> Result<bool>;
}

/// SQLite implementation of DirectoryRepository
pub struct SqliteDirectoryRepository {
    pool: SqlitePool,
}

impl SqliteDirectoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn validate(aggregate: &DirectoryAggregate) -> Result<()> {
        if aggregate.item_count == 0 {
            return Err(LibraryError::InvalidInput {
                field: "DirectoryAggregate".to_string(),
                message: format!("'{}' has no items and must be deleted", aggregate.path),
            });
        }
        Ok(())
    }
}

const SELECT_COLUMNS: &str = "SELECT path, display_name, thumbnail_ref, item_count, \
     total_size_bytes, latest_modified_at, latest_taken_at, kind_mask FROM directories";

#[async_trait]
impl DirectoryRepository for SqliteDirectoryRepository {
    async fn upsert(&self, aggregate: &DirectoryAggregate) -> Result<()> {
        Self::validate(aggregate)?;
        sqlx::query(
            r#"
            INSERT INTO directories (
                path, display_name, thumbnail_ref, item_count, total_size_bytes,
                latest_modified_at, latest_taken_at, kind_mask
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                display_name = excluded.display_name,
                thumbnail_ref = excluded.thumbnail_ref,
                item_count = excluded.item_count,
                total_size_bytes = excluded.total_size_bytes,
                latest_modified_at = excluded.latest_modified_at,
                latest_taken_at = excluded.latest_taken_at,
                kind_mask = excluded.kind_mask
            "#,
        )
        .bind(&aggregate.path)
        .bind(&aggregate.display_name)
        .bind(&aggregate.thumbnail_ref)
        .bind(aggregate.item_count as i64)
        .bind(aggregate.total_size_bytes as i64)
        .bind(aggregate.latest_modified_at)
        .bind(aggregate.latest_taken_at)
        .bind(aggregate.kind_mask.0 as i64)
        .execute(&self.pool)
        .await
        .map_err(LibraryError::from_write)?;
        Ok(())
    }

    async fn find_by_path(&self, path: &str) -> Result<Option<DirectoryAggregate>> {
        let row = sqlx::query_as::<_, DirectoryRow>(&format!("{} WHERE path = ?", SELECT_COLUMNS))
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(DirectoryAggregate::from))
    }

    async fn find_all(&self) -> Result<Vec<DirectoryAggregate>> {
        let rows =
            sqlx::query_as::<_, DirectoryRow>(&format!("{} ORDER BY path ASC", SELECT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(DirectoryAggregate::from).collect())
    }

    async fn find_under(&self, dir: &str) -> Result<Vec<DirectoryAggregate>> {
        let (exact, prefix) = subtree_bounds(dir);
        let rows = sqlx::query_as::<_, DirectoryRow>(&format!(
            "{} WHERE path = ? OR substr(path, 1, length(?)) = ? ORDER BY path ASC",
            SELECT_COLUMNS
        ))
        .bind(&exact)
        .bind(&prefix)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DirectoryAggregate::from).collect())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM directories WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
