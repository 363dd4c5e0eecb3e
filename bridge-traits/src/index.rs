//! Media Index Abstraction
//!
//! The media index is the authoritative but slow source of what media exists on the
//! device. The core pulls from it; it never pushes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Portion of the device a query or reconcile covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// All indexed media.
    Everything,
    /// A directory and everything beneath it.
    Subtree(String),
}

impl Scope {
    pub fn subtree(path: impl Into<String>) -> Self {
        Scope::Subtree(path.into())
    }

    /// Whether `path` falls inside this scope.
    ///
    /// A subtree contains its root and any path below it separated by `/`.
    pub fn contains(&self, path: &str) -> bool {
        match self {
            Scope::Everything => true,
            Scope::Subtree(root) => {
                let root = root.trim_end_matches('/');
                if root.is_empty() {
                    return path.starts_with('/');
                }
                path == root
                    || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
            }
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Everything => write!(f, "everything"),
            Scope::Subtree(path) => write!(f, "subtree:{}", path),
        }
    }
}

/// One file as reported by the index.
///
/// Times are epoch milliseconds. `taken_at` comes from embedded capture metadata
/// when the index could read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedMedia {
    pub path: String,
    pub size_bytes: u64,
    pub modified_at: i64,
    pub taken_at: Option<i64>,
    pub video_duration_ms: Option<u64>,
}

impl IndexedMedia {
    pub fn new(path: impl Into<String>, size_bytes: u64, modified_at: i64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            modified_at,
            taken_at: None,
            video_duration_ms: None,
        }
    }

    pub fn with_taken_at(mut self, taken_at: i64) -> Self {
        self.taken_at = Some(taken_at);
        self
    }

    pub fn with_video_duration(mut self, duration_ms: u64) -> Self {
        self.video_duration_ms = Some(duration_ms);
        self
    }
}

/// Authoritative media enumeration.
///
/// Implementations must:
/// - Omit entries they cannot read (permission errors are per-entry, not fatal)
/// - Return `BridgeError::NotAvailable` when the index as a whole cannot be queried
/// - Return an empty list for a subtree that does not exist
///
/// # Example
///
/// ```ignore
/// use bridge_traits::index::{MediaIndex, Scope};
///
/// async fn count(index: &dyn MediaIndex) -> Result<usize> {
///     Ok(index.query(&Scope::subtree("/dcim")).await?.len())
/// }
/// ```
#[async_trait]
pub trait MediaIndex: Send + Sync {
    /// Enumerate media inside `scope`. Order is unspecified.
    async fn query(&self, scope: &Scope) -> Result<Vec<IndexedMedia>>;
}
