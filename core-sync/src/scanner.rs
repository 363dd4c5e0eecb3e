//! # Source Scanner
//!
//! Turns what the media index reports into a path-ordered snapshot of catalog
//! entries.
//!
//! ## Overview
//!
//! The scanner:
//! - Queries the [`MediaIndex`] for a [`Scope`]
//! - Classifies each file into a [`MediaKind`] by extension, dropping non-media
//! - Skips everything inside vault storage, anything the ledger references,
//!   and configured excluded folders
//! - Fills `taken_at` from `modified_at` when the index had no capture time
//!
//! An index failure is reported as [`SyncError::ScanUnavailable`]; the caller
//! keeps its cache.

use crate::{Result, SyncError};
use bridge_traits::index::{IndexedMedia, MediaIndex, Scope};
use core_library::models::{display_name, extension_of, parent_of};
use core_library::{MediaItem, MediaKind, RecordStore};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Classification and exclusion rules for scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    pub gif_extensions: Vec<String>,
    pub svg_extensions: Vec<String>,
    pub raw_extensions: Vec<String>,

    /// Vault storage; never catalogued
    pub vault_root: Option<String>,

    /// Folders whose contents never enter the catalog
    pub excluded_paths: Vec<String>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            image_extensions: owned(&[
                "jpg", "jpeg", "png", "bmp", "webp", "heic", "heif", "apng", "avif", "jxl", "tif",
                "tiff",
            ]),
            video_extensions: owned(&["mp4", "mkv", "webm", "avi", "3gp", "3gpp", "mov", "m4v"]),
            gif_extensions: owned(&["gif"]),
            svg_extensions: owned(&["svg", "svgz"]),
            raw_extensions: owned(&["dng", "orf", "nef", "arw", "rw2", "cr2", "cr3"]),
            vault_root: None,
            excluded_paths: Vec::new(),
        }
    }
}

impl ScanConfig {
    pub fn with_vault_root(mut self, vault_root: impl Into<String>) -> Self {
        self.vault_root = Some(vault_root.into());
        self
    }

    pub fn with_excluded_paths(mut self, excluded: Vec<String>) -> Self {
        self.excluded_paths = excluded;
        self
    }

    /// Media kind for `path`, or `None` when it is not media.
    pub fn classify(&self, path: &str) -> Option<MediaKind> {
        let ext = extension_of(path);
        if ext.is_empty() {
            return None;
        }
        let has = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(&ext));

        if has(&self.raw_extensions) {
            Some(MediaKind::Raw)
        } else if has(&self.video_extensions) {
            Some(MediaKind::Video)
        } else if has(&self.gif_extensions) {
            Some(MediaKind::Gif)
        } else if has(&self.svg_extensions) {
            Some(MediaKind::Svg)
        } else if has(&self.image_extensions) {
            if is_portrait(path) {
                Some(MediaKind::Portrait)
            } else {
                Some(MediaKind::Image)
            }
        } else {
            None
        }
    }

    fn is_excluded(&self, path: &str) -> bool {
        let in_vault = self
            .vault_root
            .as_deref()
            .is_some_and(|root| Scope::subtree(root).contains(path));
        in_vault
            || self
                .excluded_paths
                .iter()
                .any(|excluded| Scope::subtree(excluded.as_str()).contains(path))
    }
}

/// Camera portrait shots: `portrait` in the file name inside an `img_*` burst folder.
fn is_portrait(path: &str) -> bool {
    let name = display_name(path).to_lowercase();
    let folder = display_name(&parent_of(path)).to_lowercase();
    name.contains("portrait") && folder.starts_with("img_")
}

/// Path-ordered catalog entries for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub scope: Scope,
    pub entries: Vec<MediaItem>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct SourceScanner {
    index: Arc<dyn MediaIndex>,
    store: RecordStore,
    config: ScanConfig,
}

impl SourceScanner {
    pub fn new(index: Arc<dyn MediaIndex>, store: RecordStore, config: ScanConfig) -> Self {
        Self {
            index,
            store,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Query the index and build a snapshot for `scope`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ScanUnavailable`] when the index query fails
    /// - [`SyncError::Cancelled`] when `cancel` fires before the index answers
    /// - [`SyncError::Store`] when the vault ledger cannot be read
    pub async fn scan(&self, scope: &Scope, cancel: &CancellationToken) -> Result<Snapshot> {
        let indexed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled { applied: 0 }),
            result = self.index.query(scope) => result.map_err(|e| {
                warn!(scope = %scope, error = %e, "Media index query failed");
                SyncError::ScanUnavailable(e.to_string())
            })?,
        };

        let vaulted: HashSet<String> = self
            .store
            .list_vault_records()
            .await?
            .into_iter()
            .map(|record| record.vault_path)
            .collect();

        let reported = indexed.len();
        let mut entries: Vec<MediaItem> = indexed
            .into_iter()
            .filter(|media| scope.contains(&media.path))
            .filter(|media| !vaulted.contains(&media.path) && !self.config.is_excluded(&media.path))
            .filter_map(|media| self.to_item(media))
            .collect();

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries.dedup_by(|a, b| a.path == b.path);

        debug!(
            scope = %scope,
            reported,
            catalogued = entries.len(),
            "Scan completed"
        );

        Ok(Snapshot {
            scope: scope.clone(),
            entries,
        })
    }

    fn to_item(&self, media: IndexedMedia) -> Option<MediaItem> {
        let kind = self.config.classify(&media.path)?;
        let duration = if kind == MediaKind::Video {
            media.video_duration_ms
        } else {
            None
        };
        Some(
            MediaItem::new(media.path, media.size_bytes, media.modified_at, kind)
                .with_taken_at(media.taken_at.unwrap_or(media.modified_at))
                .with_video_duration(duration),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::BridgeError;
    use core_library::db::create_test_pool;
    use core_library::VaultRecord;

    struct StaticIndex(Vec<IndexedMedia>);

    #[async_trait]
    impl MediaIndex for StaticIndex {
        async fn query(&self, _scope: &Scope) -> bridge_traits::error::Result<Vec<IndexedMedia>> {
            Ok(self.0.clone())
        }
    }

    struct OfflineIndex;

    #[async_trait]
    impl MediaIndex for OfflineIndex {
        async fn query(&self, _scope: &Scope) -> bridge_traits::error::Result<Vec<IndexedMedia>> {
            Err(BridgeError::NotAvailable("storage unmounted".to_string()))
        }
    }

    async fn scanner(index: impl MediaIndex + 'static, config: ScanConfig) -> SourceScanner {
        let store = RecordStore::new(create_test_pool().await.unwrap());
        SourceScanner::new(Arc::new(index), store, config)
    }

    #[test]
    fn test_classify() {
        let config = ScanConfig::default();
        assert_eq!(config.classify("/a/b.JPG"), Some(MediaKind::Image));
        assert_eq!(config.classify("/a/b.mp4"), Some(MediaKind::Video));
        assert_eq!(config.classify("/a/b.gif"), Some(MediaKind::Gif));
        assert_eq!(config.classify("/a/b.svgz"), Some(MediaKind::Svg));
        assert_eq!(config.classify("/a/b.dng"), Some(MediaKind::Raw));
        assert_eq!(config.classify("/a/notes.txt"), None);
        assert_eq!(config.classify("/a/README"), None);
    }

    #[test]
    fn test_classify_portrait() {
        let config = ScanConfig::default();
        assert_eq!(
            config.classify("/dcim/IMG_20240315/00001PORTRAIT_cover.jpg"),
            Some(MediaKind::Portrait)
        );
        assert_eq!(
            config.classify("/dcim/cam/portrait.jpg"),
            Some(MediaKind::Image)
        );
        // Videos in a burst folder stay videos.
        assert_eq!(
            config.classify("/dcim/img_1/portrait.mp4"),
            Some(MediaKind::Video)
        );
    }

    #[tokio::test]
    async fn test_scan_builds_sorted_snapshot() {
        let index = StaticIndex(vec![
            IndexedMedia::new("/dcim/cam/c.mp4", 300, 30).with_video_duration(1500),
            IndexedMedia::new("/dcim/cam/a.jpg", 100, 10).with_taken_at(5),
            IndexedMedia::new("/dcim/cam/notes.txt", 1, 1),
            IndexedMedia::new("/dcim/cam/b.png", 200, 20).with_video_duration(99),
        ]);
        let scanner = scanner(index, ScanConfig::default()).await;
        let snapshot = scanner
            .scan(&Scope::Everything, &CancellationToken::new())
            .await
            .unwrap();

        let paths: Vec<_> = snapshot.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/dcim/cam/a.jpg", "/dcim/cam/b.png", "/dcim/cam/c.mp4"]
        );
        assert_eq!(snapshot.entries[0].taken_at, 5);
        assert_eq!(snapshot.entries[1].taken_at, 20);
        assert_eq!(snapshot.entries[1].video_duration_ms, None);
        assert_eq!(snapshot.entries[2].video_duration_ms, Some(1500));
    }

    #[tokio::test]
    async fn test_scan_skips_vault_and_excluded() {
        let index = StaticIndex(vec![
            IndexedMedia::new("/data/.vault/1_a.jpg", 1, 1),
            IndexedMedia::new("/storage/private/b.jpg", 1, 1),
            IndexedMedia::new("/elsewhere/2_c.jpg", 1, 1),
            IndexedMedia::new("/dcim/d.jpg", 1, 1),
        ]);
        let config = ScanConfig::default()
            .with_vault_root("/data/.vault")
            .with_excluded_paths(vec!["/storage/private".to_string()]);
        let scanner = scanner(index, config).await;

        scanner
            .store
            .append_vault_record(&VaultRecord {
                original_path: "/dcim/c.jpg".to_string(),
                vault_path: "/elsewhere/2_c.jpg".to_string(),
                hidden_at: 2,
                original_name: "c.jpg".to_string(),
                size_bytes: 1,
            })
            .await
            .unwrap();

        let snapshot = scanner
            .scan(&Scope::Everything, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries[0].path, "/dcim/d.jpg");
    }

    #[tokio::test]
    async fn test_scan_filters_to_scope() {
        let index = StaticIndex(vec![
            IndexedMedia::new("/dcim/cam/a.jpg", 1, 1),
            IndexedMedia::new("/dcim/camera/b.jpg", 1, 1),
        ]);
        let scanner = scanner(index, ScanConfig::default()).await;
        let snapshot = scanner
            .scan(&Scope::subtree("/dcim/cam"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_unavailable() {
        let scanner = scanner(OfflineIndex, ScanConfig::default()).await;
        let err = scanner
            .scan(&Scope::Everything, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_scan_unavailable());
    }

    #[tokio::test]
    async fn test_scan_cancelled_before_query() {
        let scanner = scanner(StaticIndex(Vec::new()), ScanConfig::default()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scanner.scan(&Scope::Everything, &cancel).await.unwrap_err();
        assert_eq!(err, SyncError::Cancelled { applied: 0 });
    }
}
