//! # Catalog Service
//!
//! The entry point hosts talk to. It owns one record store, one reconcile
//! coordinator and one vault manager, all built in [`CatalogService::bootstrap`]
//! and shared by handle.
//!
//! Listings are delivered over `mpsc` channels: the cached snapshot is sent
//! immediately, then a refreshed snapshot once a background reconcile of the
//! matching scope has finished. When the index cannot be read the refreshed
//! message is skipped and the cached one stands.

use std::sync::Arc;

use bridge_traits::index::Scope;
use core_library::{
    db::DatabaseConfig,
    models::parent_of,
    projection::{project, ProjectedView},
    DirectoryAggregate, MediaItem, RecordStore, VaultRecord,
};
use core_runtime::{
    config::CoreConfig,
    events::{CoreEvent, EventBus, EventStream, LibraryEvent},
    logging::strip_path,
};
use core_sync::{ReconcileCoordinator, ReconcileReport, Reconciler, ScanConfig, SourceScanner, SyncError};
use core_vault::VaultManager;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{CoreError, Result};
use crate::CoreDependencies;

/// Whether a listing comes straight from the cache or after a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Freshness {
    Cached,
    Refreshed,
}

/// One message on a listing channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogUpdate<T> {
    pub freshness: Freshness,
    pub entries: Vec<T>,
}

impl<T> CatalogUpdate<T> {
    fn cached(entries: Vec<T>) -> Self {
        Self {
            freshness: Freshness::Cached,
            entries,
        }
    }

    fn refreshed(entries: Vec<T>) -> Self {
        Self {
            freshness: Freshness::Refreshed,
            entries,
        }
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CatalogService {
    config: Arc<CoreConfig>,
    store: RecordStore,
    coordinator: ReconcileCoordinator,
    vault: Arc<VaultManager>,
    event_bus: Arc<EventBus>,
}

impl CatalogService {
    /// Validate `config`, open the catalog database and check the vault against its ledger.
    #[instrument(skip_all, fields(database = %config.database_path.display()))]
    pub async fn bootstrap(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        if let Some(parent) = config
            .database_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            deps.filesystem.create_dir_all(parent).await.map_err(|e| {
                CoreError::InitializationFailed(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let store = RecordStore::open(DatabaseConfig::new(config.database_path.clone())).await?;
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        let scan_config = ScanConfig::default()
            .with_vault_root(config.vault_root.to_string_lossy().into_owned())
            .with_excluded_paths(config.scan.excluded_paths.clone());
        let scanner = SourceScanner::new(Arc::clone(&deps.media_index), store.clone(), scan_config);
        let reconciler = Reconciler::new(store.clone(), scanner, Arc::clone(&event_bus))
            .with_case_insensitive_paths(config.scan.case_insensitive_paths);
        let coordinator =
            ReconcileCoordinator::new(Arc::new(reconciler), config.scan.max_concurrent_reconciles);

        let vault = VaultManager::new(
            config.vault_root.clone(),
            store.clone(),
            Arc::clone(&deps.filesystem),
        )
        .with_event_bus(Arc::clone(&event_bus))
        .with_checksums(config.vault.verify_checksums);

        let report = vault.initialize().await?;
        if !report.is_consistent() {
            warn!(
                orphan_files = report.orphan_files.len(),
                missing_files = report.missing_files.len(),
                "Vault and ledger disagree"
            );
        }

        info!("Catalog service ready");

        Ok(Self {
            config: Arc::new(config),
            store,
            coordinator,
            vault: Arc::new(vault),
            event_bus,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Subscribe to every runtime event published by the catalog and vault.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// All known directories: cached first, then refreshed after a full reconcile.
    #[instrument(skip(self))]
    pub async fn subscribe_directories(
        &self,
    ) -> Result<mpsc::Receiver<CatalogUpdate<DirectoryAggregate>>> {
        let cached = self.store.get_all_directories().await?;
        let (tx, rx) = mpsc::channel(2);
        tx.send(CatalogUpdate::cached(cached)).await.ok();

        let service = self.clone();
        tokio::spawn(async move {
            if !service.reconcile_quietly(Scope::Everything).await {
                return;
            }
            match service.store.get_all_directories().await {
                Ok(entries) => {
                    if tx.send(CatalogUpdate::refreshed(entries)).await.is_err() {
                        debug!("Directory subscriber went away before the refresh");
                    }
                }
                Err(e) => error!(error = %e, "Failed to read refreshed directories"),
            }
        });

        Ok(rx)
    }

    /// Direct children of `dir`: cached first, then refreshed after reconciling that subtree.
    #[instrument(skip(self))]
    pub async fn subscribe_items(
        &self,
        dir: &str,
    ) -> Result<mpsc::Receiver<CatalogUpdate<MediaItem>>> {
        let cached = self.store.get_items_in_directory(dir).await?;
        let (tx, rx) = mpsc::channel(2);
        tx.send(CatalogUpdate::cached(cached)).await.ok();

        let service = self.clone();
        let dir = dir.to_string();
        tokio::spawn(async move {
            if !service.reconcile_quietly(Scope::subtree(dir.clone())).await {
                return;
            }
            match service.store.get_items_in_directory(&dir).await {
                Ok(entries) => {
                    if tx.send(CatalogUpdate::refreshed(entries)).await.is_err() {
                        debug!(dir = %dir, "Item subscriber went away before the refresh");
                    }
                }
                Err(e) => error!(dir = %dir, error = %e, "Failed to read refreshed items"),
            }
        });

        Ok(rx)
    }

    /// Reconcile `scope` now and report what changed.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn refresh(&self, scope: Scope) -> Result<ReconcileReport> {
        Ok(self.coordinator.reconcile(scope).await?)
    }

    /// Flip the favorite flag of a catalogued item and return the new value.
    #[instrument(skip(self), fields(path = %strip_path(path)))]
    pub async fn toggle_favorite(&self, path: &str) -> Result<bool> {
        let item = self
            .store
            .get_item(path)
            .await?
            .ok_or_else(|| CoreError::NotFound(path.to_string()))?;

        let is_favorite = !item.is_favorite;
        if !self.store.set_favorite(path, is_favorite).await? {
            return Err(CoreError::NotFound(path.to_string()));
        }

        self.emit(LibraryEvent::FavoriteChanged {
            path: path.to_string(),
            is_favorite,
        });
        Ok(is_favorite)
    }

    /// Move a file into the vault and drop it from the catalog.
    #[instrument(skip(self), fields(path = %strip_path(path)))]
    pub async fn hide_to_vault(&self, path: &str) -> Result<VaultRecord> {
        let record = self.vault.hide(path).await?;

        // The next reconcile would catch this too; doing it now keeps listings honest.
        if let Err(e) = self.forget_item(&record.original_path).await {
            warn!(
                path = %strip_path(&record.original_path),
                error = %e,
                "Hidden file is still catalogued until the next reconcile"
            );
        }

        self.emit(LibraryEvent::ItemHidden {
            path: record.original_path.clone(),
        });
        Ok(record)
    }

    /// Move a vaulted file back and re-catalog its folder.
    #[instrument(skip(self, record), fields(path = %strip_path(&record.original_path)))]
    pub async fn restore_from_vault(&self, record: &VaultRecord) -> Result<()> {
        self.vault.restore(record).await?;

        self.reconcile_quietly(Scope::subtree(parent_of(&record.original_path)))
            .await;

        self.emit(LibraryEvent::ItemRestored {
            path: record.original_path.clone(),
        });
        Ok(())
    }

    /// Every file currently in the vault, oldest first.
    pub async fn list_vaulted_files(&self) -> Result<Vec<VaultRecord>> {
        Ok(self.vault.list_hidden().await?)
    }

    /// Sort and group items with the configured view defaults.
    pub fn project_items(&self, items: Vec<MediaItem>) -> ProjectedView<MediaItem> {
        let view = &self.config.view_defaults;
        project(items, view.sort_key, view.ascending, view.group_by)
    }

    /// Sort and group directories with the configured view defaults.
    pub fn project_directories(
        &self,
        directories: Vec<DirectoryAggregate>,
    ) -> ProjectedView<DirectoryAggregate> {
        let view = &self.config.view_defaults;
        project(directories, view.sort_key, view.ascending, view.group_by)
    }

    /// Cancel every running reconcile. Vault operations are left to finish.
    pub async fn shutdown(&self) {
        self.coordinator.cancel_all().await;
        info!("Catalog service shut down");
    }

    async fn forget_item(&self, path: &str) -> Result<()> {
        self.store.delete_item(path).await?;
        self.store.recompute_directory(&parent_of(path)).await?;
        Ok(())
    }

    /// Reconcile without surfacing errors. Returns whether the cache may have moved.
    async fn reconcile_quietly(&self, scope: Scope) -> bool {
        match self.coordinator.reconcile(scope.clone()).await {
            Ok(report) => {
                debug!(scope = %scope, applied = report.applied(), "Background reconcile finished");
                true
            }
            Err(SyncError::Cancelled { applied }) => {
                debug!(scope = %scope, applied, "Background reconcile cancelled");
                true
            }
            // Already logged and published by the reconciler.
            Err(SyncError::ScanUnavailable(_)) => false,
            Err(e) => {
                error!(scope = %scope, error = %e, "Background reconcile failed");
                false
            }
        }
    }

    fn emit(&self, event: LibraryEvent) {
        self.event_bus.emit(CoreEvent::Library(event)).ok();
    }
}

impl std::fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogService")
            .field("database_path", &self.config.database_path)
            .field("vault_root", &self.config.vault_root)
            .finish()
    }
}
