//! # Sync & Reconcile Module
//!
//! Keeps the cached catalog synchronized with the authoritative media index.
//!
//! ## Overview
//!
//! The cache answers immediately; a scan is slow. This crate closes the gap:
//! - Scanning the index into a classified snapshot (`scanner`)
//! - Diffing the snapshot against the cache and applying the result (`reconciler`)
//! - Running reconciles single-flight per scope with bounded concurrency (`coordinator`)
//!
//! ## Components
//!
//! - **Source Scanner** (`scanner`): Classification, vault and exclusion filtering
//! - **Catalog Reconciler** (`reconciler`): Diff, apply, aggregate recompute, events
//! - **Reconcile Runs** (`run`): Run identity and the per-run report
//! - **Coordinator** (`coordinator`): Worker tasks, joining, cancellation

pub mod coordinator;
pub mod error;
pub mod reconciler;
pub mod run;
pub mod scanner;

pub use coordinator::ReconcileCoordinator;
pub use error::{Result, SyncError};
pub use reconciler::{ChangeSet, Reconciler, Update};
pub use run::{ReconcileReport, ReconcileRunId};
pub use scanner::{ScanConfig, Snapshot, SourceScanner};
