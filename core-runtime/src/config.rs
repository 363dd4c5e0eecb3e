//! # Core Configuration Module
//!
//! Provides configuration management for the media catalog core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every setting the core reads at startup. Validation is
//! fail-fast: a config that would corrupt the vault or stall reconciliation is
//! rejected before anything touches disk.
//!
//! ## Required Settings
//!
//! - `database_path` - SQLite file backing the record store
//! - `vault_root` - Directory that holds vaulted files
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_library::projection::{GroupBy, SortKey};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/catalog.db")
//!     .vault_root("/data/.vault")
//!     .default_sort(SortKey::TakenAt, false)
//!     .default_group_by(GroupBy::TakenMonth)
//!     .exclude_path("/storage/Android/data")
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing vault root
//! let config = CoreConfig::builder()
//!     .database_path("/data/catalog.db")
//!     .build()
//!     .expect("Should fail - vault root is required");
//! ```

use crate::error::{Error, Result};
use core_library::projection::{GroupBy, SortKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on concurrently running reconciles.
const MAX_RECONCILE_WORKERS: usize = 64;

/// Core configuration for the media catalog.
///
/// Use [`CoreConfigBuilder`] to construct instances. The core treats it as
/// read-only after bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Directory that holds vaulted files
    pub vault_root: PathBuf,

    /// Default sort and grouping for listings
    pub view_defaults: ViewDefaults,

    /// Scanning and reconciliation behaviour
    pub scan: ScanSettings,

    /// Vault behaviour
    pub vault: VaultSettings,

    /// Capacity of the event bus ring buffer
    pub event_buffer_size: usize,
}

/// Default projection used when the UI does not ask for one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefaults {
    pub sort_key: SortKey,
    pub ascending: bool,
    pub group_by: GroupBy,
}

impl Default for ViewDefaults {
    fn default() -> Self {
        Self {
            sort_key: SortKey::ModifiedAt,
            ascending: false,
            group_by: GroupBy::None,
        }
    }
}

/// Settings consumed by the scanner and reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Treat paths differing only by case as the same file
    pub case_insensitive_paths: bool,

    /// Folders whose contents never enter the catalog
    pub excluded_paths: Vec<String>,

    /// How many scopes may reconcile at the same time
    pub max_concurrent_reconciles: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            case_insensitive_paths: false,
            excluded_paths: Vec::new(),
            max_concurrent_reconciles: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Compare SHA-256 digests of source and copy in addition to byte counts
    pub verify_checksums: bool,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path and vault root are not empty
    /// - The database does not live inside the vault (it would be reported as an orphan)
    /// - Excluded paths are non-empty and do not repeat the vault root
    /// - Worker and buffer limits are within range
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.vault_root.as_os_str().is_empty() {
            return Err(Error::Config("Vault root cannot be empty".to_string()));
        }

        if self.database_path.starts_with(&self.vault_root) {
            return Err(Error::Config(format!(
                "Database path {} must not be inside the vault root {}",
                self.database_path.display(),
                self.vault_root.display()
            )));
        }

        for excluded in &self.scan.excluded_paths {
            if excluded.trim().is_empty() {
                return Err(Error::Config(
                    "Excluded paths cannot contain empty entries".to_string(),
                ));
            }
            if Path::new(excluded) == self.vault_root {
                return Err(Error::Config(format!(
                    "Vault root {} is always excluded; remove it from excluded paths",
                    excluded
                )));
            }
        }

        if self.scan.max_concurrent_reconciles == 0 {
            return Err(Error::Config(
                "max_concurrent_reconciles must be greater than 0".to_string(),
            ));
        }

        if self.scan.max_concurrent_reconciles > MAX_RECONCILE_WORKERS {
            return Err(Error::Config(format!(
                "max_concurrent_reconciles exceeds maximum of {}",
                MAX_RECONCILE_WORKERS
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    vault_root: Option<PathBuf>,
    view_defaults: ViewDefaults,
    scan: ScanSettings,
    vault: VaultSettings,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the database file path.
    ///
    /// This is a required field.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the vault root directory.
    ///
    /// This is a required field. It is created on first use.
    pub fn vault_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.vault_root = Some(path.into());
        self
    }

    /// Sets the default sort key and direction.
    ///
    /// Default: `ModifiedAt`, descending
    pub fn default_sort(mut self, sort_key: SortKey, ascending: bool) -> Self {
        self.view_defaults.sort_key = sort_key;
        self.view_defaults.ascending = ascending;
        self
    }

    /// Sets the default grouping.
    ///
    /// Default: `GroupBy::None`
    pub fn default_group_by(mut self, group_by: GroupBy) -> Self {
        self.view_defaults.group_by = group_by;
        self
    }

    pub fn view_defaults(mut self, defaults: ViewDefaults) -> Self {
        self.view_defaults = defaults;
        self
    }

    /// Match catalog paths case-insensitively during reconciliation.
    ///
    /// Default: false
    pub fn case_insensitive_paths(mut self, enabled: bool) -> Self {
        self.scan.case_insensitive_paths = enabled;
        self
    }

    /// Adds a folder whose contents never enter the catalog.
    pub fn exclude_path(mut self, path: impl Into<String>) -> Self {
        self.scan.excluded_paths.push(path.into());
        self
    }

    /// Limits concurrently running reconciles.
    ///
    /// Default: 2
    pub fn max_concurrent_reconciles(mut self, limit: usize) -> Self {
        self.scan.max_concurrent_reconciles = limit;
        self
    }

    /// Verify vault copies with SHA-256 in addition to byte counts.
    ///
    /// Default: false
    pub fn verify_checksums(mut self, enabled: bool) -> Self {
        self.vault.verify_checksums = enabled;
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if a required path is
    /// missing or [`CoreConfig::validate`] rejects the values.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self
            .database_path
            .ok_or_else(|| Error::Config("Database path is required".to_string()))?;

        let vault_root = self
            .vault_root
            .ok_or_else(|| Error::Config("Vault root is required".to_string()))?;

        let config = CoreConfig {
            database_path,
            vault_root,
            view_defaults: self.view_defaults,
            scan: self.scan,
            vault: self.vault,
            event_buffer_size: self.event_buffer_size.unwrap_or(100),
        };

        config.validate()?;
        Ok(config)
    }
}
