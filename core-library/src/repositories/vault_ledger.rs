//! Vault ledger repository trait and implementation
//!
//! The ledger is the record of which vault file came from where. Rows are keyed by
//! `vault_path`; `original_path` is unique as well, so a file cannot be hidden twice.

use crate::error::{LibraryError, Result};
use crate::models::{VaultRecord, VaultRecordRow};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

#[async_trait]
pub trait VaultLedgerRepository: Send + Sync {
    /// Append a record
    ///
    /// # Errors
    /// `LibraryError::Constraint` when either path is already recorded
    async fn insert(&self, record: &VaultRecord) -> Result<()>;

    /// Remove the record for `vault_path`
    ///
    /// # Returns
    /// `Ok(false)` if no record matched
    async fn remove(&self, vault_path: &str) -> Result<bool>;

    /// All records, oldest first
    async fn find_all(&self) -> Result<Vec<VaultRecord>>;

    async fn find_by_vault_path(&self, vault_path: &str) -> Result<Option<VaultRecord>>;

    async fn find_by_original(&self, original_path: &str) -> Result<Option<VaultRecord>>;
}

pub struct SqliteVaultLedgerRepository {
    pool: SqlitePool,
}

impl SqliteVaultLedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT original_path, vault_path, hidden_at, original_name, size_bytes FROM vault_ledger";

#[async_trait]
impl VaultLedgerRepository for SqliteVaultLedgerRepository {
    async fn insert(&self, record: &VaultRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vault_ledger (vault_path, original_path, hidden_at, original_name, size_bytes)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.vault_path)
        .bind(&record.original_path)
        .bind(record.hidden_at)
        .bind(&record.original_name)
        .bind(record.size_bytes as i64)
        .execute(&self.pool)
        .await
        .map_err(LibraryError::from_write)?;

        debug!(vault_path = %record.vault_path, "Appended vault record");
        Ok(())
    }

    async fn remove(&self, vault_path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vault_ledger WHERE vault_path = ?")
            .bind(vault_path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_all(&self) -> Result<Vec<VaultRecord>> {
        let rows = sqlx::query_as::<_, VaultRecordRow>(&format!(
            "{} ORDER BY hidden_at ASC, vault_path ASC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VaultRecord::from).collect())
    }

    async fn find_by_vault_path(&self, vault_path: &str) -> Result<Option<VaultRecord>> {
        let row =
            sqlx::query_as::<_, VaultRecordRow>(&format!("{} WHERE vault_path = ?", SELECT_COLUMNS))
                .bind(vault_path)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(VaultRecord::from))
    }

    async fn find_by_original(&self, original_path: &str) -> Result<Option<VaultRecord>> {
        let row = sqlx::query_as::<_, VaultRecordRow>(&format!(
            "{} WHERE original_path = ?",
            SELECT_COLUMNS
        ))
        .bind(original_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(VaultRecord::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn record(original: &str, vault: &str, hidden_at: i64) -> VaultRecord {
        VaultRecord {
            original_path: original.to_string(),
            vault_path: vault.to_string(),
            hidden_at,
            original_name: crate::models::display_name(original),
            size_bytes: 100,
        }
    }

    #[tokio::test]
    async fn test_insert_list_remove() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteVaultLedgerRepository::new(pool);

        repo.insert(&record("/d/b.jpg", "/vault/2_b.jpg", 2))
            .await
            .unwrap();
        repo.insert(&record("/d/a.jpg", "/vault/1_a.jpg", 1))
            .await
            .unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].original_path, "/d/a.jpg");

        let found = repo.find_by_original("/d/b.jpg").await.unwrap().unwrap();
        assert_eq!(found.vault_path, "/vault/2_b.jpg");

        assert!(repo.remove("/vault/1_a.jpg").await.unwrap());
        assert!(!repo.remove("/vault/1_a.jpg").await.unwrap());
        assert!(repo.find_by_vault_path("/vault/1_a.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_paths_are_constraint_errors() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteVaultLedgerRepository::new(pool);

        repo.insert(&record("/d/a.jpg", "/vault/1_a.jpg", 1))
            .await
            .unwrap();

        let same_vault = repo.insert(&record("/d/other.jpg", "/vault/1_a.jpg", 2)).await;
        assert!(matches!(same_vault, Err(LibraryError::Constraint(_))));

        let same_original = repo.insert(&record("/d/a.jpg", "/vault/2_a.jpg", 2)).await;
        assert!(matches!(same_original, Err(LibraryError::Constraint(_))));
    }
}
