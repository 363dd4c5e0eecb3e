//! Comparison of vault storage against the ledger.

use core_library::VaultRecord;
use serde::{Deserialize, Serialize};

/// Differences between the vault directory and the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Files in the vault directory that no record points at
    pub orphan_files: Vec<String>,
    /// Records whose vault file no longer exists
    pub missing_files: Vec<VaultRecord>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.orphan_files.is_empty() && self.missing_files.is_empty()
    }
}
