//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (media index and
//! filesystem) into the catalog, reconciler and vault. Desktop apps typically
//! enable the `desktop-shims` feature (which depends on `bridge-desktop`) and
//! call [`bootstrap_desktop`]; other hosts build [`CoreDependencies`] from
//! their own adapters and call [`CatalogService::bootstrap`].

pub mod catalog;
pub mod error;

pub use catalog::{CatalogService, CatalogUpdate, Freshness};
pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{index::MediaIndex, storage::FileSystemAccess};

/// Aggregated handle to all bridge dependencies the core requires.
#[derive(Clone)]
pub struct CoreDependencies {
    pub media_index: Arc<dyn MediaIndex>,
    pub filesystem: Arc<dyn FileSystemAccess>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(media_index: Arc<dyn MediaIndex>, filesystem: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            media_index,
            filesystem,
        }
    }
}

#[cfg(feature = "desktop-shims")]
impl CoreDependencies {
    /// Walk `roots` on the local disk and move files with `tokio::fs`.
    pub fn desktop(roots: Vec<std::path::PathBuf>) -> Self {
        Self::new(
            Arc::new(bridge_desktop::FsMediaIndex::new(roots)),
            Arc::new(bridge_desktop::TokioFileSystem::new()),
        )
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::config::CoreConfig;
/// use core_service::bootstrap_desktop;
///
/// let config = CoreConfig::builder()
///     .database_path("/home/me/.gallery/catalog.db")
///     .vault_root("/home/me/Pictures/.vault")
///     .build()?;
/// let catalog = bootstrap_desktop(config, vec!["/home/me/Pictures".into()]).await?;
/// let hidden = catalog.list_vaulted_files().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    config: core_runtime::config::CoreConfig,
    roots: Vec<std::path::PathBuf>,
) -> Result<CatalogService> {
    CatalogService::bootstrap(config, CoreDependencies::desktop(roots)).await
}
