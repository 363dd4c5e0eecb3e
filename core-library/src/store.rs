//! # Record Store
//!
//! Single entry point to the persisted catalog: media items, directory aggregates
//! and the vault ledger. Every mutating call is durable when it returns.
//!
//! Readers receive owned snapshots; nothing returned here aliases live state.

use crate::db::{create_pool, DatabaseConfig};
use crate::error::Result;
use crate::models::{DirectoryAggregate, MediaItem, VaultRecord};
use crate::repositories::{
    DirectoryRepository, MediaItemRepository, SqliteDirectoryRepository,
    SqliteMediaItemRepository, SqliteVaultLedgerRepository, VaultLedgerRepository,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

/// Outcome of [`RecordStore::recompute_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryChange {
    /// Stored aggregate already matched its children (or neither exists)
    Unchanged,
    Updated(DirectoryAggregate),
    /// Last child is gone and the aggregate was deleted
    Removed,
}

#[derive(Clone)]
pub struct RecordStore {
    items: Arc<dyn MediaItemRepository>,
    directories: Arc<dyn DirectoryRepository>,
    ledger: Arc<dyn VaultLedgerRepository>,
}

impl RecordStore {
    /// Build a store over an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            items: Arc::new(SqliteMediaItemRepository::new(pool.clone())),
            directories: Arc::new(SqliteDirectoryRepository::new(pool.clone())),
            ledger: Arc::new(SqliteVaultLedgerRepository::new(pool)),
        }
    }

    /// Open (creating and migrating if needed) the database described by `config`.
    pub async fn open(config: DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Assemble a store from individual repositories; used to inject test doubles.
    pub fn from_repositories(
        items: Arc<dyn MediaItemRepository>,
        directories: Arc<dyn DirectoryRepository>,
        ledger: Arc<dyn VaultLedgerRepository>,
    ) -> Self {
        Self {
            items,
            directories,
            ledger,
        }
    }

    // ---------------------------------------------------------------------
    // Media items
    // ---------------------------------------------------------------------

    pub async fn upsert_items(&self, items: &[MediaItem]) -> Result<()> {
        self.items.upsert_many(items).await
    }

    /// Deleting a path that is not catalogued is a no-op.
    pub async fn delete_item(&self, path: &str) -> Result<()> {
        let removed = self.items.delete(path).await?;
        if !removed {
            debug!(path, "Delete of unknown media item ignored");
        }
        Ok(())
    }

    pub async fn get_item(&self, path: &str) -> Result<Option<MediaItem>> {
        self.items.find_by_path(path).await
    }

    /// The directory and all of its descendants.
    pub async fn get_items_under(&self, dir: &str) -> Result<Vec<MediaItem>> {
        self.items.find_under(dir).await
    }

    /// Direct children of `dir` only.
    pub async fn get_items_in_directory(&self, dir: &str) -> Result<Vec<MediaItem>> {
        self.items.find_in_directory(dir).await
    }

    pub async fn get_all_items(&self) -> Result<Vec<MediaItem>> {
        self.items.find_all().await
    }

    /// Returns `false` when the path is not catalogued.
    pub async fn set_favorite(&self, path: &str, is_favorite: bool) -> Result<bool> {
        self.items.set_favorite(path, is_favorite).await
    }

    // ---------------------------------------------------------------------
    // Directory aggregates
    // ---------------------------------------------------------------------

    pub async fn upsert_directory(&self, aggregate: &DirectoryAggregate) -> Result<()> {
        self.directories.upsert(aggregate).await
    }

    pub async fn get_directory(&self, path: &str) -> Result<Option<DirectoryAggregate>> {
        self.directories.find_by_path(path).await
    }

    pub async fn get_all_directories(&self) -> Result<Vec<DirectoryAggregate>> {
        self.directories.find_all().await
    }

    pub async fn get_directories_under(&self, dir: &str) -> Result<Vec<DirectoryAggregate>> {
        self.directories.find_under(dir).await
    }

    pub async fn delete_directory(&self, path: &str) -> Result<()> {
        self.directories.delete(path).await?;
        Ok(())
    }

    /// Re-fold the aggregate of `path` from its direct children.
    ///
    /// Writes only when the stored row differs, and deletes the row once the
    /// directory is empty.
    pub async fn recompute_directory(&self, path: &str) -> Result<DirectoryChange> {
        let children = self.items.find_in_directory(path).await?;
        let stored = self.directories.find_by_path(path).await?;

        match (DirectoryAggregate::fold(path, &children), stored) {
            (Some(fresh), Some(stored)) if fresh == stored => Ok(DirectoryChange::Unchanged),
            (Some(fresh), _) => {
                self.directories.upsert(&fresh).await?;
                Ok(DirectoryChange::Updated(fresh))
            }
            (None, Some(_)) => {
                self.directories.delete(path).await?;
                Ok(DirectoryChange::Removed)
            }
            (None, None) => Ok(DirectoryChange::Unchanged),
        }
    }

    // ---------------------------------------------------------------------
    // Vault ledger
    // ---------------------------------------------------------------------

    pub async fn append_vault_record(&self, record: &VaultRecord) -> Result<()> {
        self.ledger.insert(record).await
    }

    /// Returns `false` when no record had that vault path.
    pub async fn remove_vault_record(&self, vault_path: &str) -> Result<bool> {
        self.ledger.remove(vault_path).await
    }

    pub async fn list_vault_records(&self) -> Result<Vec<VaultRecord>> {
        self.ledger.find_all().await
    }

    pub async fn find_vault_record(&self, vault_path: &str) -> Result<Option<VaultRecord>> {
        self.ledger.find_by_vault_path(vault_path).await
    }

    pub async fn find_vault_record_by_original(
        &self,
        original_path: &str,
    ) -> Result<Option<VaultRecord>> {
        self.ledger.find_by_original(original_path).await
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::MediaKind;

    async fn store() -> RecordStore {
        RecordStore::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_delete_unknown_item_is_noop() {
        let store = store().await;
        store.delete_item("/nothing/here.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_scenario() {
        let store = store().await;

        let items = vec![
            MediaItem::new("/dcim/cam/a.jpg", 100, 1, MediaKind::Image),
            MediaItem::new("/dcim/cam/b.jpg", 200, 2, MediaKind::Image),
            MediaItem::new("/dcim/cam/c.jpg", 300, 3, MediaKind::Image),
        ];
        store.upsert_items(&items).await.unwrap();

        let children = store.get_items_in_directory("/dcim/cam").await.unwrap();
        let agg = DirectoryAggregate::fold("/dcim/cam", &children).unwrap();
        store.upsert_directory(&agg).await.unwrap();
        let stored = store.get_directory("/dcim/cam").await.unwrap().unwrap();
        assert_eq!((stored.item_count, stored.total_size_bytes), (3, 600));

        store.delete_item("/dcim/cam/b.jpg").await.unwrap();
        let children = store.get_items_in_directory("/dcim/cam").await.unwrap();
        let agg = DirectoryAggregate::fold("/dcim/cam", &children).unwrap();
        store.upsert_directory(&agg).await.unwrap();
        let stored = store.get_directory("/dcim/cam").await.unwrap().unwrap();
        assert_eq!((stored.item_count, stored.total_size_bytes), (2, 400));

        store.delete_item("/dcim/cam/a.jpg").await.unwrap();
        store.delete_item("/dcim/cam/c.jpg").await.unwrap();
        let children = store.get_items_in_directory("/dcim/cam").await.unwrap();
        assert!(DirectoryAggregate::fold("/dcim/cam", &children).is_none());
        store.delete_directory("/dcim/cam").await.unwrap();
        assert!(store.get_all_directories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recompute_directory() {
        let store = store().await;
        assert_eq!(
            store.recompute_directory("/dcim/cam").await.unwrap(),
            DirectoryChange::Unchanged
        );

        store
            .upsert_items(&[
                MediaItem::new("/dcim/cam/a.jpg", 100, 5, MediaKind::Image),
                MediaItem::new("/dcim/cam/b.mp4", 200, 9, MediaKind::Video),
            ])
            .await
            .unwrap();

        let change = store.recompute_directory("/dcim/cam").await.unwrap();
        let DirectoryChange::Updated(agg) = change else {
            panic!("expected an update, got {:?}", change);
        };
        assert_eq!(agg.thumbnail_ref, "/dcim/cam/b.mp4");
        assert_eq!(agg.total_size_bytes, 300);

        assert_eq!(
            store.recompute_directory("/dcim/cam").await.unwrap(),
            DirectoryChange::Unchanged
        );

        store.delete_item("/dcim/cam/a.jpg").await.unwrap();
        store.delete_item("/dcim/cam/b.mp4").await.unwrap();
        assert_eq!(
            store.recompute_directory("/dcim/cam").await.unwrap(),
            DirectoryChange::Removed
        );
        assert!(store.get_directory("/dcim/cam").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vault_record_lookup() {
        let store = store().await;
        let record = VaultRecord {
            original_path: "/dcim/cam/a.jpg".to_string(),
            vault_path: "/vault/1_a.jpg".to_string(),
            hidden_at: 1,
            original_name: "a.jpg".to_string(),
            size_bytes: 3,
        };
        store.append_vault_record(&record).await.unwrap();

        assert_eq!(
            store
                .find_vault_record_by_original("/dcim/cam/a.jpg")
                .await
                .unwrap(),
            Some(record.clone())
        );
        assert!(store.remove_vault_record(&record.vault_path).await.unwrap());
        assert!(store.list_vault_records().await.unwrap().is_empty());
    }
}
