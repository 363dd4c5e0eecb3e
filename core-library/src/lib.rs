//! # Media Library Module
//!
//! Owns the persisted media catalog and the pure projection engine that turns it
//! into display listings.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - Repository patterns for media items, directory aggregates and the vault ledger
//! - The [`RecordStore`](store::RecordStore) façade used by the reconciler and the vault
//! - Sorting, grouping and labelling of listings ([`projection`])

pub mod db;
pub mod error;
pub mod models;
pub mod projection;
pub mod repositories;
pub mod store;

pub use error::{LibraryError, Result};
pub use models::{DirectoryAggregate, KindMask, MediaItem, MediaKind, VaultRecord};
pub use store::{DirectoryChange, RecordStore};
