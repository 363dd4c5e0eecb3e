//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations for the catalog tables.
//!
//! ## Architecture
//!
//! - Traits define the interface for each table
//! - SQLite implementations use sqlx against a shared `SqlitePool`
//! - All operations return `Result<T>` and are durable on return
//!
//! ## Available Repositories
//!
//! - `MediaItemRepository` - Catalogued media files
//! - `DirectoryRepository` - Per-directory aggregates
//! - `VaultLedgerRepository` - Records of files relocated into the vault

pub mod directory;
pub mod media_item;
pub mod vault_ledger;

pub use directory::{DirectoryRepository, SqliteDirectoryRepository};
pub use media_item::{MediaItemRepository, SqliteMediaItemRepository};
pub use vault_ledger::{SqliteVaultLedgerRepository, VaultLedgerRepository};

/// Bounds of a subtree query: the directory itself and the prefix its descendants share.
pub(crate) fn subtree_bounds(dir: &str) -> (String, String) {
    let base = dir.trim_end_matches('/');
    if base.is_empty() {
        ("/".to_string(), "/".to_string())
    } else {
        (base.to_string(), format!("{}/", base))
    }
}
