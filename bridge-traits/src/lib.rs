//! # Host Bridge Traits
//!
//! Contracts between the catalog core and the host platform.
//!
//! ## Overview
//!
//! The core never touches the device directly. Everything it needs from the
//! outside world is expressed as a trait here and implemented per platform
//! (see `bridge-desktop` for the desktop adapters).
//!
//! ## Traits
//!
//! ### Media discovery
//! - [`MediaIndex`](index::MediaIndex) - Authoritative (slow) enumeration of media on the device
//!
//! ### File I/O
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File operations used by the vault
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations convert
//! platform failures into it and keep the offending path in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so handles can be shared across worker tasks.

pub mod error;
pub mod index;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use index::{IndexedMedia, MediaIndex, Scope};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
