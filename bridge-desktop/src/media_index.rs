//! Media Index Implementation backed by a directory walk
//!
//! Walks the configured roots with `walkdir` on the blocking pool and reads capture
//! dates from EXIF for formats that carry it.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    index::{IndexedMedia, MediaIndex, Scope},
};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Marker file that hides a folder from media listings.
const NO_MEDIA_MARKER: &str = ".nomedia";

/// Extensions whose containers may carry an EXIF block.
const EXIF_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "tif", "tiff", "heic", "heif", "png", "webp", "avif", "dng", "orf", "nef",
    "arw", "rw2", "cr2", "cr3",
];

/// Desktop media index.
///
/// Reports every regular file under its roots. Classification into media kinds is
/// left to the caller; the index only enumerates and reads timestamps.
///
/// Video duration is not probed on desktop and is always reported as `None`.
#[derive(Debug, Clone)]
pub struct FsMediaIndex {
    roots: Vec<PathBuf>,
    show_hidden: bool,
}

impl FsMediaIndex {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            show_hidden: false,
        }
    }

    /// Include dot-files and folders marked with `.nomedia`.
    pub fn with_hidden(mut self, show_hidden: bool) -> Self {
        self.show_hidden = show_hidden;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve a scope into the directories that must be walked.
    fn walk_targets(&self, scope: &Scope) -> Result<Vec<PathBuf>> {
        match scope {
            Scope::Everything => {
                for root in &self.roots {
                    Self::ensure_mounted(root)?;
                }
                Ok(self.roots.clone())
            }
            Scope::Subtree(dir) => {
                let dir = Path::new(dir);
                let mut targets = Vec::new();
                for root in &self.roots {
                    if root.starts_with(dir) {
                        Self::ensure_mounted(root)?;
                        targets.push(root.clone());
                    } else if dir.starts_with(root) {
                        // A missing folder under a live root is empty; under a dead root it is unknown.
                        Self::ensure_mounted(root)?;
                        if dir.is_dir() {
                            targets.push(dir.to_path_buf());
                        }
                    }
                }
                Ok(targets)
            }
        }
    }

    fn ensure_mounted(root: &Path) -> Result<()> {
        if root.is_dir() {
            Ok(())
        } else {
            Err(BridgeError::NotAvailable(format!(
                "media root {} is not accessible",
                root.display()
            )))
        }
    }

    fn is_visible(entry: &DirEntry, show_hidden: bool) -> bool {
        if show_hidden || entry.depth() == 0 {
            return true;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            return false;
        }
        !(entry.file_type().is_dir() && entry.path().join(NO_MEDIA_MARKER).exists())
    }

    fn walk(targets: Vec<PathBuf>, show_hidden: bool) -> Vec<IndexedMedia> {
        let mut seen = HashSet::new();
        let mut media = Vec::new();

        for target in targets {
            if !show_hidden && target.join(NO_MEDIA_MARKER).exists() {
                continue;
            }

            let walker = WalkDir::new(&target)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| Self::is_visible(e, show_hidden));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!(error = %e, "Skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path().to_string_lossy().into_owned();
                if !seen.insert(path.clone()) {
                    continue;
                }
                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        debug!(path = %path, error = %e, "Skipping entry without metadata");
                        continue;
                    }
                };
                let modified_at = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);

                let mut item = IndexedMedia::new(path, metadata.len(), modified_at);
                item.taken_at = read_capture_time(entry.path());
                media.push(item);
            }
        }

        media
    }
}

#[async_trait]
impl MediaIndex for FsMediaIndex {
    async fn query(&self, scope: &Scope) -> Result<Vec<IndexedMedia>> {
        let targets = self.walk_targets(scope)?;
        let show_hidden = self.show_hidden;

        let media = tokio::task::spawn_blocking(move || Self::walk(targets, show_hidden))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("media walk panicked: {}", e)))?;

        debug!(scope = %scope, count = media.len(), "Media index query completed");
        Ok(media)
    }
}

/// Read `DateTimeOriginal` (falling back to `DateTime`) as epoch milliseconds.
///
/// Missing or malformed EXIF yields `None`.
fn read_capture_time(path: &Path) -> Option<i64> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !EXIF_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_) | exif::Error::NotSupported(_) | exif::Error::BlankValue(_)) => {
            return None
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to read EXIF block");
            return None;
        }
    };

    [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .into_iter()
        .find_map(|tag| {
            let field = exif.get_field(tag, exif::In::PRIMARY)?;
            match &field.value {
                exif::Value::Ascii(values) => {
                    let raw = values.first()?;
                    let parsed = exif::DateTime::from_ascii(raw).ok()?;
                    exif_datetime_to_millis(&parsed)
                }
                _ => None,
            }
        })
}

fn exif_datetime_to_millis(dt: &exif::DateTime) -> Option<i64> {
    let naive = NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)?;
    let millis = naive.and_utc().timestamp_millis();
    // EXIF wall time is local unless an offset tag was attached.
    let offset_ms = dt.offset.map(|minutes| minutes as i64 * 60_000).unwrap_or(0);
    Some(millis - offset_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, bytes).unwrap();
    }

    fn paths(media: &[IndexedMedia]) -> Vec<String> {
        let mut out: Vec<String> = media
            .iter()
            .map(|m| {
                Path::new(&m.path)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        out.sort();
        out
    }

    #[tokio::test]
    async fn test_query_everything_lists_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("cam/a.jpg"), &[0u8; 100]);
        touch(&dir.path().join("cam/b.png"), &[0u8; 200]);
        touch(&dir.path().join("shots/c.mp4"), &[0u8; 300]);

        let index = FsMediaIndex::new(vec![dir.path().to_path_buf()]);
        let media = index.query(&Scope::Everything).await.unwrap();

        assert_eq!(paths(&media), vec!["a.jpg", "b.png", "c.mp4"]);
        let a = media.iter().find(|m| m.path.ends_with("a.jpg")).unwrap();
        assert_eq!(a.size_bytes, 100);
        assert!(a.modified_at > 0);
        // No EXIF block in a zero-filled file.
        assert_eq!(a.taken_at, None);
    }

    #[tokio::test]
    async fn test_nomedia_and_dotfiles_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("visible/a.jpg"), b"x");
        touch(&dir.path().join("visible/.hidden.jpg"), b"x");
        touch(&dir.path().join("private/b.jpg"), b"x");
        touch(&dir.path().join("private/.nomedia"), b"");
        touch(&dir.path().join(".thumbs/c.jpg"), b"x");

        let index = FsMediaIndex::new(vec![dir.path().to_path_buf()]);
        let media = index.query(&Scope::Everything).await.unwrap();
        assert_eq!(paths(&media), vec!["a.jpg"]);

        let index = index.with_hidden(true);
        let media = index.query(&Scope::Everything).await.unwrap();
        assert_eq!(
            paths(&media),
            vec![".hidden.jpg", ".nomedia", "a.jpg", "b.jpg", "c.jpg"]
        );
    }

    #[tokio::test]
    async fn test_subtree_query() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("cam/a.jpg"), b"x");
        touch(&dir.path().join("other/b.jpg"), b"x");

        let index = FsMediaIndex::new(vec![dir.path().to_path_buf()]);
        let scope = Scope::subtree(dir.path().join("cam").to_string_lossy());
        let media = index.query(&scope).await.unwrap();
        assert_eq!(paths(&media), vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn test_missing_subtree_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = FsMediaIndex::new(vec![dir.path().to_path_buf()]);
        let scope = Scope::subtree(dir.path().join("gone").to_string_lossy());
        assert!(index.query(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subtree_of_unmounted_root_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let card = dir.path().join("sdcard");
        let index = FsMediaIndex::new(vec![card.clone()]);

        let scope = Scope::subtree(card.join("dcim/cam").to_string_lossy());
        let err = index.query(&scope).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));

        // Once mounted, the same missing folder is simply empty.
        fs::create_dir_all(&card).unwrap();
        assert!(index.query(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let index = FsMediaIndex::new(vec![dir.path().join("unmounted")]);
        let err = index.query(&Scope::Everything).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));
    }

    #[test]
    fn test_exif_datetime_conversion() {
        let dt = exif::DateTime::from_ascii(b"2024:03:15 10:30:00").unwrap();
        let millis = exif_datetime_to_millis(&dt).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert_eq!(millis, expected);
    }
}
