//! Domain models for the media catalog
//!
//! Owned snapshots handed out by the record store, plus the path helpers every
//! layer uses to derive parents and display names.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::LibraryError;

// =============================================================================
// Media kinds
// =============================================================================

/// Classification of a catalogued file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Gif,
    Raw,
    Svg,
    Portrait,
}

impl MediaKind {
    pub const ALL: [MediaKind; 6] = [
        MediaKind::Image,
        MediaKind::Video,
        MediaKind::Gif,
        MediaKind::Raw,
        MediaKind::Svg,
        MediaKind::Portrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Gif => "gif",
            MediaKind::Raw => "raw",
            MediaKind::Svg => "svg",
            MediaKind::Portrait => "portrait",
        }
    }

    /// Human-readable name used for group labels.
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
            MediaKind::Gif => "GIF",
            MediaKind::Raw => "RAW",
            MediaKind::Svg => "SVG",
            MediaKind::Portrait => "Portrait",
        }
    }

    /// Bit used for this kind inside a [`KindMask`].
    pub fn bit(&self) -> u32 {
        match self {
            MediaKind::Image => 1,
            MediaKind::Video => 1 << 1,
            MediaKind::Gif => 1 << 2,
            MediaKind::Raw => 1 << 3,
            MediaKind::Svg => 1 << 4,
            MediaKind::Portrait => 1 << 5,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "gif" => Ok(MediaKind::Gif),
            "raw" => Ok(MediaKind::Raw),
            "svg" => Ok(MediaKind::Svg),
            "portrait" => Ok(MediaKind::Portrait),
            other => Err(LibraryError::InvalidInput {
                field: "kind".to_string(),
                message: format!("unknown media kind '{}'", other),
            }),
        }
    }
}

/// Set of media kinds, stored as a bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindMask(pub u32);

impl KindMask {
    pub const EMPTY: KindMask = KindMask(0);

    pub fn all() -> Self {
        MediaKind::ALL.iter().copied().collect()
    }

    pub fn of(kind: MediaKind) -> Self {
        KindMask(kind.bit())
    }

    pub fn insert(&mut self, kind: MediaKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(&self, kind: MediaKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn union(self, other: KindMask) -> KindMask {
        KindMask(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn kinds(&self) -> Vec<MediaKind> {
        MediaKind::ALL
            .iter()
            .copied()
            .filter(|k| self.contains(*k))
            .collect()
    }
}

impl FromIterator<MediaKind> for KindMask {
    fn from_iter<I: IntoIterator<Item = MediaKind>>(iter: I) -> Self {
        let mut mask = KindMask::EMPTY;
        for kind in iter {
            mask.insert(kind);
        }
        mask
    }
}

// =============================================================================
// Path helpers
// =============================================================================

/// Parent directory of a `/`-separated path. The root's parent is the root.
pub fn parent_of(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
        None => String::new(),
    }
}

/// Last path component.
pub fn display_name(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Lower-cased extension without the dot, empty when there is none.
pub fn extension_of(path: &str) -> String {
    let name = display_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A single catalogued media file.
///
/// All timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Absolute path, unique across the catalog
    pub path: String,
    pub display_name: String,
    /// Always `parent_of(path)`
    pub parent_path: String,
    pub size_bytes: u64,
    pub modified_at: i64,
    /// Capture time, or `modified_at` when the file carries none
    pub taken_at: i64,
    pub kind: MediaKind,
    /// Present only for [`MediaKind::Video`]
    pub video_duration_ms: Option<u64>,
    pub is_favorite: bool,
}

impl MediaItem {
    pub fn new(
        path: impl Into<String>,
        size_bytes: u64,
        modified_at: i64,
        kind: MediaKind,
    ) -> Self {
        let path = path.into();
        Self {
            display_name: display_name(&path),
            parent_path: parent_of(&path),
            path,
            size_bytes,
            modified_at,
            taken_at: modified_at,
            kind,
            video_duration_ms: None,
            is_favorite: false,
        }
    }

    pub fn with_taken_at(mut self, taken_at: i64) -> Self {
        self.taken_at = taken_at;
        self
    }

    pub fn with_video_duration(mut self, duration_ms: Option<u64>) -> Self {
        self.video_duration_ms = duration_ms;
        self
    }

    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    pub fn extension(&self) -> String {
        extension_of(&self.path)
    }

    /// Compare everything the index reports, ignoring the user-owned favorite flag.
    pub fn same_content(&self, other: &MediaItem) -> bool {
        self.path == other.path
            && self.size_bytes == other.size_bytes
            && self.modified_at == other.modified_at
            && self.taken_at == other.taken_at
            && self.kind == other.kind
            && self.video_duration_ms == other.video_duration_ms
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.path.trim().is_empty() {
            return Err("Media path cannot be empty".to_string());
        }
        if self.parent_path != parent_of(&self.path) {
            return Err(format!(
                "Parent path '{}' does not match path '{}'",
                self.parent_path, self.path
            ));
        }
        if self.size_bytes > i64::MAX as u64 {
            return Err("Media size exceeds storable range".to_string());
        }
        if self.video_duration_ms.is_some() && self.kind != MediaKind::Video {
            return Err("Only videos carry a duration".to_string());
        }
        Ok(())
    }
}

/// Per-directory summary derived from the items directly inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryAggregate {
    pub path: String,
    pub display_name: String,
    /// Most recently modified item; ties go to the smallest path
    pub thumbnail_ref: String,
    pub item_count: u64,
    pub total_size_bytes: u64,
    pub latest_modified_at: i64,
    pub latest_taken_at: i64,
    pub kind_mask: KindMask,
}

impl DirectoryAggregate {
    /// Fold the direct children of `path` into an aggregate.
    ///
    /// Returns `None` when there are no children; the directory must then be deleted.
    pub fn fold(path: &str, items: &[MediaItem]) -> Option<Self> {
        let mut iter = items.iter();
        let first = iter.next()?;

        let mut aggregate = DirectoryAggregate {
            path: path.to_string(),
            display_name: display_name(path),
            thumbnail_ref: first.path.clone(),
            item_count: 1,
            total_size_bytes: first.size_bytes,
            latest_modified_at: first.modified_at,
            latest_taken_at: first.taken_at,
            kind_mask: KindMask::of(first.kind),
        };
        let mut thumb_modified = first.modified_at;

        for item in iter {
            aggregate.item_count += 1;
            aggregate.total_size_bytes += item.size_bytes;
            aggregate.latest_modified_at = aggregate.latest_modified_at.max(item.modified_at);
            aggregate.latest_taken_at = aggregate.latest_taken_at.max(item.taken_at);
            aggregate.kind_mask.insert(item.kind);

            if item.modified_at > thumb_modified
                || (item.modified_at == thumb_modified && item.path < aggregate.thumbnail_ref)
            {
                thumb_modified = item.modified_at;
                aggregate.thumbnail_ref = item.path.clone();
            }
        }

        Some(aggregate)
    }
}

/// Ledger entry for a file relocated into the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultRecord {
    pub original_path: String,
    /// Unique inside the vault namespace
    pub vault_path: String,
    /// Epoch milliseconds
    pub hidden_at: i64,
    pub original_name: String,
    pub size_bytes: u64,
}

// =============================================================================
// Row mapping
// =============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct MediaItemRow {
    pub path: String,
    pub display_name: String,
    pub parent_path: String,
    pub size_bytes: i64,
    pub modified_at: i64,
    pub taken_at: i64,
    pub kind: String,
    pub video_duration_ms: Option<i64>,
    pub is_favorite: bool,
}

impl TryFrom<MediaItemRow> for MediaItem {
    type Error = LibraryError;

    fn try_from(row: MediaItemRow) -> Result<Self, Self::Error> {
        Ok(MediaItem {
            path: row.path,
            display_name: row.display_name,
            parent_path: row.parent_path,
            size_bytes: row.size_bytes.max(0) as u64,
            modified_at: row.modified_at,
            taken_at: row.taken_at,
            kind: row.kind.parse()?,
            video_duration_ms: row.video_duration_ms.map(|d| d.max(0) as u64),
            is_favorite: row.is_favorite,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct DirectoryRow {
    pub path: String,
    pub display_name: String,
    pub thumbnail_ref: String,
    pub item_count: i64,
    pub total_size_bytes: i64,
    pub latest_modified_at: i64,
    pub latest_taken_at: i64,
    pub kind_mask: i64,
}

impl From<DirectoryRow> for DirectoryAggregate {
    fn from(row: DirectoryRow) -> Self {
        DirectoryAggregate {
            path: row.path,
            display_name: row.display_name,
            thumbnail_ref: row.thumbnail_ref,
            item_count: row.item_count.max(0) as u64,
            total_size_bytes: row.total_size_bytes.max(0) as u64,
            latest_modified_at: row.latest_modified_at,
            latest_taken_at: row.latest_taken_at,
            kind_mask: KindMask(row.kind_mask as u32),
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct VaultRecordRow {
    pub original_path: String,
    pub vault_path: String,
    pub hidden_at: i64,
    pub original_name: String,
    pub size_bytes: i64,
}

impl From<VaultRecordRow> for VaultRecord {
    fn from(row: VaultRecordRow) -> Self {
        VaultRecord {
            original_path: row.original_path,
            vault_path: row.vault_path,
            hidden_at: row.hidden_at,
            original_name: row.original_name,
            size_bytes: row.size_bytes.max(0) as u64,
        }
    }
}
