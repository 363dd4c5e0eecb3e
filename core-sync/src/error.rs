use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

/// Errors from scanning and reconciliation.
///
/// Payloads are strings so a single reconcile result can be cloned to every
/// caller that joined the same run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Media index unavailable: {0}")]
    ScanUnavailable(String),

    #[error("Reconcile cancelled after {applied} changes")]
    Cancelled { applied: u64 },

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Reconcile task aborted: {0}")]
    Aborted(String),
}

impl SyncError {
    /// Whether the cache was left untouched because the index could not be read.
    pub fn is_scan_unavailable(&self) -> bool {
        matches!(self, SyncError::ScanUnavailable(_))
    }
}

impl From<LibraryError> for SyncError {
    fn from(err: LibraryError) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        SyncError::ScanUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
