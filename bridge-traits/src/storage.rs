//! Storage and File System Abstractions
//!
//! File operations the vault needs, expressed so that a platform can back them with
//! whatever sandboxed storage API it has.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    /// Epoch milliseconds
    pub created_at: Option<i64>,
    /// Epoch milliseconds
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O operations to support different platforms:
/// - Desktop: Direct filesystem access
/// - iOS/Android: Sandboxed app directories, SAF/document picker
///
/// Mutating operations are durable on return: data is flushed to stable storage
/// before the future resolves.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn stash(fs: &dyn FileSystemAccess, src: &Path, dir: &Path) -> Result<u64> {
///     fs.create_dir_all(dir).await?;
///     fs.copy_new(src, &dir.join("copy.bin")).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    ///
    /// For large files, consider using `open_read_stream` instead.
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating it if it doesn't exist
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Open a file for streaming reads
    async fn open_read_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;

    /// Copy `src` to `dst` without ever replacing an existing `dst`.
    ///
    /// Fails with an `AlreadyExists` I/O error when `dst` is present. The copy is
    /// synced to disk before returning. Returns the number of bytes written.
    async fn copy_new(&self, src: &Path, dst: &Path) -> Result<u64>;
}
