//! # Vault Manager
//!
//! Moves files into the vault directory and back.
//!
//! ## Hide
//!
//! 1. Verify the original exists
//! 2. Copy it to `<vault_root>/<hidden_at_millis>_<original_name>`, never overwriting
//! 3. Verify the byte count (and optionally the SHA-256 digest) of the copy
//! 4. Append the ledger record
//! 5. Delete the original
//!
//! A failure before step 4 removes the partial copy and leaves the original alone.
//! A ledger failure removes the copy, returns [`VaultError::Ledger`] and re-runs
//! the consistency check. A failed delete in step 5 does not fail the hide; the
//! duplicate original is reported through `VaultEvent::ResidualOriginal`.
//!
//! ## Restore
//!
//! The mirror image: copy back (refusing to overwrite), verify, remove the
//! ledger record, then delete the vault file. A ledger failure removes the
//! restored copy and the record stays `Vaulted`.

use crate::claims::PathClaims;
use crate::consistency::ConsistencyReport;
use crate::error::{Result, VaultError};
use bridge_traits::error::BridgeError;
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::{Clock, SystemClock};
use core_library::models::display_name;
use core_library::{RecordStore, VaultRecord};
use core_runtime::events::{CoreEvent, EventBus, VaultEvent};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, instrument, warn};

const DIGEST_CHUNK_SIZE: usize = 64 * 1024;

pub struct VaultManager {
    vault_root: PathBuf,
    store: RecordStore,
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    event_bus: Option<Arc<EventBus>>,
    verify_checksums: bool,
    claims: PathClaims,
}

impl VaultManager {
    /// Create a vault manager rooted at `vault_root`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use core_vault::VaultManager;
    /// use std::sync::Arc;
    ///
    /// let vault = VaultManager::new("/data/.vault", store, Arc::new(TokioFileSystem))
    ///     .with_event_bus(event_bus);
    /// vault.initialize().await?;
    /// ```
    pub fn new(
        vault_root: impl Into<PathBuf>,
        store: RecordStore,
        fs: Arc<dyn FileSystemAccess>,
    ) -> Self {
        Self {
            vault_root: vault_root.into(),
            store,
            fs,
            clock: Arc::new(SystemClock),
            event_bus: None,
            verify_checksums: false,
            claims: PathClaims::new(),
        }
    }

    /// Set event bus for vault events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Compare SHA-256 digests of source and copy in addition to byte counts.
    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.verify_checksums = enabled;
        self
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    /// Create the vault directory and run one consistency check.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<ConsistencyReport> {
        self.fs.create_dir_all(&self.vault_root).await?;
        let report = self.check_consistency().await?;
        info!(
            vault_root = ?self.vault_root,
            orphans = report.orphan_files.len(),
            missing = report.missing_files.len(),
            "Vault initialized"
        );
        Ok(report)
    }

    /// Move `original_path` into the vault.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] if the original does not exist
    /// - [`VaultError::Conflict`] if it is already vaulted, busy, or the vault name is taken
    /// - [`VaultError::Io`] if copying or verification fails
    /// - [`VaultError::Ledger`] if the record could not be written
    #[instrument(skip(self))]
    pub async fn hide(&self, original_path: &str) -> Result<VaultRecord> {
        let mut claim = self.claims.claim([original_path])?;
        let original = Path::new(original_path);
        if normalize(original).starts_with(normalize(&self.vault_root)) {
            return Err(VaultError::Conflict(format!(
                "{} is inside the vault",
                original_path
            )));
        }

        if !self.fs.exists(original).await? {
            return Err(VaultError::NotFound(original_path.to_string()));
        }
        let source = self.fs.metadata(original).await?;
        if source.is_directory {
            return Err(VaultError::NotFound(format!(
                "{} is a directory",
                original_path
            )));
        }
        if self
            .store
            .find_vault_record_by_original(original_path)
            .await?
            .is_some()
        {
            return Err(VaultError::Conflict(format!(
                "{} is already vaulted",
                original_path
            )));
        }

        let hidden_at = self.clock.unix_timestamp_millis();
        let original_name = display_name(original_path);
        let vault_file = self
            .vault_root
            .join(format!("{}_{}", hidden_at, original_name));
        let vault_path = vault_file.to_string_lossy().into_owned();
        claim.extend(vault_path.clone())?;

        // Copying
        self.fs.create_dir_all(&self.vault_root).await?;
        let copied = self.copy_verified(original, &vault_file, source.size).await?;

        // Vaulted once the record is durable.
        let record = VaultRecord {
            original_path: original_path.to_string(),
            vault_path: vault_path.clone(),
            hidden_at,
            original_name,
            size_bytes: copied,
        };
        if let Err(e) = self.store.append_vault_record(&record).await {
            error!(path = %original_path, error = %e, "Failed to record vaulted file");
            self.discard(&vault_file).await;
            return Err(self.ledger_failure(original_path, e).await);
        }

        if let Err(e) = self.fs.delete_file(original).await {
            warn!(
                path = %original_path,
                error = %e,
                "Vaulted file but could not delete the original"
            );
            self.emit(VaultEvent::ResidualOriginal {
                original_path: original_path.to_string(),
                vault_path: vault_path.clone(),
                message: e.to_string(),
            });
        }

        info!(path = %original_path, vault_path = %vault_path, bytes = copied, "File hidden");
        self.emit(VaultEvent::Hidden {
            original_path: original_path.to_string(),
            vault_path,
        });
        Ok(record)
    }

    /// Move a vaulted file back to its original path.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] if the record or the vault file is gone
    /// - [`VaultError::Conflict`] if something already exists at the original path
    /// - [`VaultError::Io`] if copying or verification fails
    /// - [`VaultError::Ledger`] if the record could not be removed
    #[instrument(skip(self, record), fields(vault_path = %record.vault_path))]
    pub async fn restore(&self, record: &VaultRecord) -> Result<()> {
        let _claim = self
            .claims
            .claim([record.original_path.as_str(), record.vault_path.as_str()])?;

        let stored = self
            .store
            .find_vault_record(&record.vault_path)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("no ledger record for {}", record.vault_path)))?;

        let vault_file = Path::new(&stored.vault_path);
        let original = Path::new(&stored.original_path);
        if !self.fs.exists(vault_file).await? {
            return Err(VaultError::NotFound(stored.vault_path.clone()));
        }
        if self.fs.exists(original).await? {
            return Err(VaultError::Conflict(format!(
                "{} already exists",
                stored.original_path
            )));
        }

        // Restoring
        if let Some(parent) = original.parent() {
            self.fs.create_dir_all(parent).await?;
        }
        let expected = self.fs.metadata(vault_file).await?.size;
        self.copy_verified(vault_file, original, expected).await?;

        match self.store.remove_vault_record(&stored.vault_path).await {
            Ok(true) => {}
            Ok(false) => warn!("Ledger record vanished during restore"),
            Err(e) => {
                error!(path = %stored.original_path, error = %e, "Failed to clear ledger record");
                self.discard(original).await;
                return Err(self.ledger_failure(&stored.original_path, e).await);
            }
        }

        if let Err(e) = self.fs.delete_file(vault_file).await {
            warn!(
                vault_path = %stored.vault_path,
                error = %e,
                "Restored file but could not delete the vault copy"
            );
        }

        info!(path = %stored.original_path, "File restored");
        self.emit(VaultEvent::Restored {
            original_path: stored.original_path.clone(),
            vault_path: stored.vault_path.clone(),
        });
        Ok(())
    }

    /// Ledger contents, oldest first.
    pub async fn list_hidden(&self) -> Result<Vec<VaultRecord>> {
        Ok(self.store.list_vault_records().await?)
    }

    /// Compare the vault directory with the ledger.
    ///
    /// Files claimed by an in-flight operation are not reported as orphans.
    #[instrument(skip(self))]
    pub async fn check_consistency(&self) -> Result<ConsistencyReport> {
        let records = self.store.list_vault_records().await?;

        let mut on_disk = HashSet::new();
        if self.fs.exists(&self.vault_root).await? {
            for entry in self.fs.list_directory(&self.vault_root).await? {
                match self.fs.metadata(&entry).await {
                    Ok(meta) if meta.is_directory => continue,
                    Ok(_) => {
                        on_disk.insert(entry.to_string_lossy().into_owned());
                    }
                    Err(e) => debug!(entry = ?entry, error = %e, "Skipping unreadable vault entry"),
                }
            }
        }

        let recorded: HashSet<&str> = records.iter().map(|r| r.vault_path.as_str()).collect();
        let mut orphan_files: Vec<String> = on_disk
            .iter()
            .filter(|path| !recorded.contains(path.as_str()) && !self.claims.is_held(path))
            .cloned()
            .collect();
        orphan_files.sort();

        let missing_files: Vec<VaultRecord> = records
            .into_iter()
            .filter(|r| !on_disk.contains(&r.vault_path) && !self.claims.is_held(&r.vault_path))
            .collect();

        let report = ConsistencyReport {
            orphan_files,
            missing_files,
        };
        if !report.is_consistent() {
            warn!(
                orphans = report.orphan_files.len(),
                missing = report.missing_files.len(),
                "Vault storage and ledger disagree"
            );
        }
        self.emit(VaultEvent::ConsistencyChecked {
            orphan_files: report.orphan_files.len() as u64,
            missing_files: report.missing_files.len() as u64,
        });
        Ok(report)
    }

    /// Copy `src` to a new file at `dst` and verify it. The copy is removed on failure.
    async fn copy_verified(&self, src: &Path, dst: &Path, expected: u64) -> Result<u64> {
        let copied = match self.fs.copy_new(src, dst).await {
            Ok(copied) => copied,
            // The existing file is not ours to remove.
            Err(e) if e.is_already_exists() => {
                return Err(VaultError::Conflict(format!(
                    "{} already exists",
                    dst.display()
                )))
            }
            Err(e) => {
                self.discard(dst).await;
                return Err(VaultError::Io(e));
            }
        };

        if copied != expected {
            self.discard(dst).await;
            return Err(VaultError::Io(BridgeError::OperationFailed(format!(
                "copied {} of {} bytes to {}",
                copied,
                expected,
                dst.display()
            ))));
        }

        if self.verify_checksums {
            let verified = match (self.digest(src).await, self.digest(dst).await) {
                (Ok(a), Ok(b)) => Ok(a == b),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
            match verified {
                Ok(true) => {}
                Ok(false) => {
                    self.discard(dst).await;
                    return Err(VaultError::Io(BridgeError::OperationFailed(format!(
                        "checksum mismatch for {}",
                        dst.display()
                    ))));
                }
                Err(e) => {
                    self.discard(dst).await;
                    return Err(VaultError::Io(e));
                }
            }
        }

        Ok(copied)
    }

    /// Streamed SHA-256 of a file, hex encoded.
    async fn digest(&self, path: &Path) -> std::result::Result<String, BridgeError> {
        let mut reader = self.fs.open_read_stream(path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Best-effort removal of a copy that must not survive.
    async fn discard(&self, path: &Path) {
        if let Err(e) = self.fs.delete_file(path).await {
            if !e.is_not_found() {
                warn!(path = ?path, error = %e, "Failed to remove partial copy");
            }
        }
    }

    async fn ledger_failure(&self, path: &str, err: core_library::LibraryError) -> VaultError {
        self.emit(VaultEvent::LedgerFailure {
            path: path.to_string(),
            message: err.to_string(),
        });
        if let Err(check) = self.check_consistency().await {
            error!(error = %check, "Consistency check after ledger failure failed");
        }
        VaultError::Ledger(err)
    }

    fn emit(&self, event: VaultEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Vault(event)).ok();
        }
    }
}

/// Resolve `.` and `..` without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

impl std::fmt::Debug for VaultManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultManager")
            .field("vault_root", &self.vault_root)
            .field("verify_checksums", &self.verify_checksums)
            .finish_non_exhaustive()
    }
}
