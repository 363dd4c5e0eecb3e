//! # Vault Module
//!
//! Relocates media into an isolated vault directory and back, with every
//! relocation tracked in the ledger table of the record store.
//!
//! ## Overview
//!
//! Each relocation moves through `Present → Copying → Vaulted → Restoring → Present`.
//! A ledger record exists exactly while a file is `Vaulted`: it is written only
//! after the vault copy is durable and verified, and removed only after the file
//! is durably back at its original path. Files are relocated, not encrypted.
//!
//! ## Components
//!
//! - **Vault Manager** (`manager`): hide, restore, listing, initialization
//! - **Path Claims** (`claims`): per-path serialization of concurrent operations
//! - **Consistency** (`consistency`): vault storage compared with the ledger

pub mod claims;
pub mod consistency;
pub mod error;
pub mod manager;

pub use consistency::ConsistencyReport;
pub use error::{Result, VaultError};
pub use manager::VaultManager;
