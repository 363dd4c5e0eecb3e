//! # Catalog Reconciler
//!
//! Brings the cached catalog in line with a fresh scan.
//!
//! ## Workflow
//!
//! 1. Load the cached items for the scope
//! 2. Scan the index for the same scope
//! 3. Diff by path: vanished items are deleted, new or changed ones upserted
//!    (the favorite flag is carried over from the cached row)
//! 4. Apply deletes, then upserts, one item at a time
//! 5. Recompute the aggregate of every touched directory, plus any directory
//!    whose aggregate is missing or no longer has items
//!
//! Cancellation is checked between item mutations. Aggregates for the changes
//! that were already committed are recomputed before [`SyncError::Cancelled`]
//! is returned, so the store never holds a stale fold.

use crate::run::{ReconcileReport, ReconcileRunId};
use crate::scanner::{Snapshot, SourceScanner};
use crate::{Result, SyncError};
use bridge_traits::index::Scope;
use core_library::{DirectoryChange, MediaItem, RecordStore};
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// A changed item, and the differently-cased row it replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub item: MediaItem,
    pub replaces: Option<String>,
}

/// Result of diffing cached rows against a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Cached paths the snapshot no longer contains
    pub removed: Vec<String>,
    pub added: Vec<MediaItem>,
    pub updated: Vec<Update>,
    pub unchanged: u64,
}

impl ChangeSet {
    /// Diff `cached` against `scanned`.
    ///
    /// With `case_insensitive` set, paths equal up to case are the same file; the
    /// scanned casing wins and the old row is replaced.
    pub fn diff(cached: Vec<MediaItem>, scanned: Vec<MediaItem>, case_insensitive: bool) -> Self {
        let key = |path: &str| {
            if case_insensitive {
                path.to_lowercase()
            } else {
                path.to_string()
            }
        };

        let mut changes = ChangeSet::default();
        let mut by_key: HashMap<String, MediaItem> = HashMap::with_capacity(cached.len());
        for item in cached {
            if let Some(shadowed) = by_key.insert(key(&item.path), item) {
                changes.removed.push(shadowed.path);
            }
        }

        let mut seen = HashSet::with_capacity(scanned.len());
        for entry in scanned {
            let k = key(&entry.path);
            if !seen.insert(k.clone()) {
                debug!(path = %entry.path, "Skipping case-duplicate entry");
                continue;
            }

            match by_key.remove(&k) {
                None => changes.added.push(entry),
                Some(previous) => {
                    let entry = entry.with_favorite(previous.is_favorite);
                    if previous.path != entry.path {
                        changes.updated.push(Update {
                            item: entry,
                            replaces: Some(previous.path),
                        });
                    } else if previous.same_content(&entry) {
                        changes.unchanged += 1;
                    } else {
                        changes.updated.push(Update {
                            item: entry,
                            replaces: None,
                        });
                    }
                }
            }
        }

        changes.removed.extend(by_key.into_values().map(|item| item.path));
        changes.removed.sort();
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.updated.is_empty()
    }
}

pub struct Reconciler {
    store: RecordStore,
    scanner: SourceScanner,
    event_bus: Arc<EventBus>,
    case_insensitive: bool,
}

impl Reconciler {
    pub fn new(store: RecordStore, scanner: SourceScanner, event_bus: Arc<EventBus>) -> Self {
        Self {
            store,
            scanner,
            event_bus,
            case_insensitive: false,
        }
    }

    pub fn with_case_insensitive_paths(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Run one reconcile pass over `scope`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ScanUnavailable`]: the cache was not touched
    /// - [`SyncError::Cancelled`]: some changes may be applied; their aggregates are current
    /// - [`SyncError::Store`]: a write failed midway
    #[instrument(skip(self, cancel), fields(scope = %scope))]
    pub async fn reconcile(
        &self,
        scope: &Scope,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport> {
        let run_id = ReconcileRunId::new();
        let started = Instant::now();

        self.emit(CatalogEvent::ReconcileStarted {
            run_id: run_id.to_string(),
            scope: scope.to_string(),
        });

        let result = match self.scanner.scan(scope, cancel).await {
            Ok(snapshot) => self.apply(run_id, snapshot, cancel).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(mut report) => {
                report.duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    run_id = %run_id,
                    added = report.added,
                    updated = report.updated,
                    removed = report.removed,
                    unchanged = report.unchanged,
                    directories_updated = report.directories_updated,
                    directories_removed = report.directories_removed,
                    duration_ms = report.duration_ms,
                    "Reconcile completed"
                );
                self.emit(CatalogEvent::ReconcileCompleted {
                    run_id: run_id.to_string(),
                    scope: scope.to_string(),
                    added: report.added,
                    updated: report.updated,
                    removed: report.removed,
                    unchanged: report.unchanged,
                    directories_updated: report.directories_updated,
                    directories_removed: report.directories_removed,
                    duration_ms: report.duration_ms,
                });
                Ok(report)
            }
            Err(SyncError::ScanUnavailable(message)) => {
                warn!(run_id = %run_id, %message, "Scan unavailable, keeping cached catalog");
                self.emit(CatalogEvent::ScanUnavailable {
                    scope: scope.to_string(),
                    message: message.clone(),
                });
                Err(SyncError::ScanUnavailable(message))
            }
            Err(SyncError::Cancelled { applied }) => {
                info!(run_id = %run_id, applied, "Reconcile cancelled");
                self.emit(CatalogEvent::ReconcileCancelled {
                    run_id: run_id.to_string(),
                    scope: scope.to_string(),
                    applied,
                });
                Err(SyncError::Cancelled { applied })
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Reconcile failed");
                self.emit(CatalogEvent::ReconcileFailed {
                    run_id: run_id.to_string(),
                    scope: scope.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn cached_items(&self, scope: &Scope) -> Result<Vec<MediaItem>> {
        let items = match scope {
            Scope::Everything => self.store.get_all_items().await?,
            Scope::Subtree(dir) => self.store.get_items_under(dir).await?,
        };
        Ok(items)
    }

    async fn apply(
        &self,
        run_id: ReconcileRunId,
        snapshot: Snapshot,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport> {
        let scope = snapshot.scope;
        let cached = self.cached_items(&scope).await?;
        let scanned_parents: HashSet<String> = snapshot
            .entries
            .iter()
            .map(|item| item.parent_path.clone())
            .collect();

        let changes = ChangeSet::diff(cached, snapshot.entries, self.case_insensitive);
        debug!(
            removed = changes.removed.len(),
            added = changes.added.len(),
            updated = changes.updated.len(),
            unchanged = changes.unchanged,
            "Computed change set"
        );

        let mut report = ReconcileReport::new(run_id, scope.clone());
        report.unchanged = changes.unchanged;
        let mut touched = BTreeSet::new();

        let cancelled = self
            .apply_items(&changes, cancel, &mut report, &mut touched)
            .await?;

        if !cancelled {
            // Self-heal: parents without an aggregate and aggregates without items.
            let known: HashSet<String> = match &scope {
                Scope::Everything => self.store.get_all_directories().await?,
                Scope::Subtree(dir) => self.store.get_directories_under(dir).await?,
            }
            .into_iter()
            .map(|aggregate| aggregate.path)
            .collect();

            for parent in &scanned_parents {
                if !known.contains(parent) {
                    touched.insert(parent.clone());
                }
            }
            for path in known {
                if !scanned_parents.contains(&path) {
                    touched.insert(path);
                }
            }
        }

        for dir in &touched {
            match self.store.recompute_directory(dir).await? {
                DirectoryChange::Updated(_) => report.directories_updated += 1,
                DirectoryChange::Removed => report.directories_removed += 1,
                DirectoryChange::Unchanged => {}
            }
        }

        if cancelled {
            return Err(SyncError::Cancelled {
                applied: report.applied(),
            });
        }
        Ok(report)
    }

    /// Apply item mutations; returns `true` when stopped by cancellation.
    async fn apply_items(
        &self,
        changes: &ChangeSet,
        cancel: &CancellationToken,
        report: &mut ReconcileReport,
        touched: &mut BTreeSet<String>,
    ) -> Result<bool> {
        for path in &changes.removed {
            if cancel.is_cancelled() {
                return Ok(true);
            }
            self.store.delete_item(path).await?;
            touched.insert(core_library::models::parent_of(path));
            report.removed += 1;
        }

        for item in &changes.added {
            if cancel.is_cancelled() {
                return Ok(true);
            }
            self.store.upsert_items(std::slice::from_ref(item)).await?;
            touched.insert(item.parent_path.clone());
            report.added += 1;
        }

        for update in &changes.updated {
            if cancel.is_cancelled() {
                return Ok(true);
            }
            if let Some(old_path) = &update.replaces {
                self.store.delete_item(old_path).await?;
                touched.insert(core_library::models::parent_of(old_path));
            }
            self.store
                .upsert_items(std::slice::from_ref(&update.item))
                .await?;
            touched.insert(update.item.parent_path.clone());
            report.updated += 1;
        }

        Ok(false)
    }

    fn emit(&self, event: CatalogEvent) {
        self.event_bus.emit(CoreEvent::Catalog(event)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::MediaKind;

    fn item(path: &str, size: u64) -> MediaItem {
        MediaItem::new(path, size, 1_000, MediaKind::Image)
    }

    #[test]
    fn test_diff_classifies_changes() {
        let cached = vec![
            item("/a/1.jpg", 10),
            item("/a/2.jpg", 20).with_favorite(true),
            item("/a/3.jpg", 30),
        ];
        let scanned = vec![item("/a/2.jpg", 25), item("/a/3.jpg", 30), item("/a/4.jpg", 40)];

        let changes = ChangeSet::diff(cached, scanned, false);
        assert_eq!(changes.removed, vec!["/a/1.jpg"]);
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.added[0].path, "/a/4.jpg");
        assert_eq!(changes.updated.len(), 1);
        assert_eq!(changes.updated[0].item.size_bytes, 25);
        assert!(changes.updated[0].item.is_favorite);
        assert_eq!(changes.unchanged, 1);
    }

    #[test]
    fn test_diff_case_sensitive_treats_case_change_as_new_file() {
        let changes = ChangeSet::diff(vec![item("/a/IMG.jpg", 1)], vec![item("/a/img.jpg", 1)], false);
        assert_eq!(changes.removed, vec!["/a/IMG.jpg"]);
        assert_eq!(changes.added.len(), 1);
        assert!(changes.updated.is_empty());
    }

    #[test]
    fn test_diff_case_insensitive_replaces_row() {
        let cached = vec![item("/a/IMG.jpg", 1).with_favorite(true)];
        let scanned = vec![item("/a/img.jpg", 1), item("/a/Img.JPG", 1)];

        let changes = ChangeSet::diff(cached, scanned, true);
        assert!(changes.removed.is_empty());
        assert!(changes.added.is_empty());
        assert_eq!(
            changes.updated,
            vec![Update {
                item: item("/a/img.jpg", 1).with_favorite(true),
                replaces: Some("/a/IMG.jpg".to_string()),
            }]
        );
    }

    #[test]
    fn test_diff_empty() {
        let changes = ChangeSet::diff(vec![item("/a/1.jpg", 1)], vec![item("/a/1.jpg", 1)], false);
        assert!(changes.is_empty());
        assert_eq!(changes.unchanged, 1);
    }
}
