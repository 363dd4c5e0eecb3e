//! # Reconcile Runs
//!
//! Identity and outcome of a single reconcile pass.

use bridge_traits::index::Scope;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a reconcile run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconcileRunId(Uuid);

impl ReconcileRunId {
    /// Create a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ReconcileRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReconcileRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ReconcileRunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// What a completed reconcile changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub run_id: ReconcileRunId,
    pub scope: Scope,
    /// Paths seen for the first time
    pub added: u64,
    /// Known paths whose size, times, kind or casing changed
    pub updated: u64,
    /// Cached paths the index no longer reports
    pub removed: u64,
    pub unchanged: u64,
    /// Aggregates written because their fold changed
    pub directories_updated: u64,
    /// Aggregates deleted because their directory emptied
    pub directories_removed: u64,
    pub duration_ms: u64,
}

impl ReconcileReport {
    pub(crate) fn new(run_id: ReconcileRunId, scope: Scope) -> Self {
        Self {
            run_id,
            scope,
            added: 0,
            updated: 0,
            removed: 0,
            unchanged: 0,
            directories_updated: 0,
            directories_removed: 0,
            duration_ms: 0,
        }
    }

    /// Item mutations committed to the store.
    pub fn applied(&self) -> u64 {
        self.added + self.updated + self.removed
    }

    /// Whether the run wrote anything at all.
    pub fn has_changes(&self) -> bool {
        self.applied() > 0 || self.directories_updated > 0 || self.directories_removed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = ReconcileRunId::new();
        let b = ReconcileRunId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str(), a.to_string());
    }

    #[test]
    fn test_report_counters() {
        let mut report = ReconcileReport::new(ReconcileRunId::new(), Scope::Everything);
        assert!(!report.has_changes());

        report.unchanged = 4;
        assert!(!report.has_changes());

        report.added = 2;
        report.removed = 1;
        assert_eq!(report.applied(), 3);
        assert!(report.has_changes());
    }
}
