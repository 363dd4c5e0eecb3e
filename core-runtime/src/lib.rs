//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the catalog, sync and vault crates:
//! logging, configuration and the event bus.
//!
//! Nothing here touches media or storage directly. The crates above it emit
//! [`events::CoreEvent`]s and read [`config::CoreConfig`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};
