//! # Vault Error Types

use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

/// Errors from hide and restore. None of them are retried automatically.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The file (or the ledger record) to operate on does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The destination already exists, or another vault operation holds the path.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Copying, verifying or deleting a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] BridgeError),

    /// The ledger could not be read or written.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LibraryError),
}

impl VaultError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, VaultError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
