//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace crates
//! (`core-service`, `core-library`). Host applications can depend on
//! `gallery-workspace` and enable the documented features without wiring each
//! crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "projection")]
pub use core_library::projection;
