//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `MediaIndex` backed by a recursive directory walk (`walkdir`) with EXIF capture
//!   dates read through `kamadak-exif`
//! - `FileSystemAccess` using `tokio::fs`, with durable writes
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FsMediaIndex, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let index = FsMediaIndex::new(vec!["/home/me/Pictures".into()]);
//!     let fs = TokioFileSystem::new();
//!
//!     // Hand both to CatalogService::bootstrap
//! }
//! ```

mod filesystem;
mod media_index;

pub use filesystem::TokioFileSystem;
pub use media_index::FsMediaIndex;
