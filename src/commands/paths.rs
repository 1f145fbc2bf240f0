use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Resolves the catalog path: the explicit one if given, otherwise the
/// default under the user's config directory.
#[tracing::instrument(skip(runtime))]
pub fn catalog_path<R: Runtime>(runtime: &R, catalog: Option<PathBuf>) -> Result<PathBuf> {
    match catalog {
        Some(path) => Ok(path),
        None => default_catalog_path(runtime),
    }
}

/// `<config_dir>/pkgcorr/catalog.json`
#[tracing::instrument(skip(runtime))]
pub fn default_catalog_path<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let config_dir = runtime
        .config_dir()
        .context("Could not find config directory")?;
    let path = config_dir.join("pkgcorr").join("catalog.json");
    debug!("Using default catalog {}", path.display());
    Ok(path)
}
