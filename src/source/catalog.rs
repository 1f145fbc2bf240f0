//! Catalog file: the JSON document describing the installed repository and
//! every available source the CLI correlates.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::{MemorySource, Source, SourceData};
use crate::composite::{CompositeSource, CorrelationOptions};
use crate::runtime::Runtime;

const COMPOSITE_IDENTIFIER: &str = "*composite";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<SourceData>,
    #[serde(default)]
    pub available: Vec<SourceData>,
}

impl CatalogFile {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            anyhow::bail!("Catalog file not found: {}", path.display());
        }

        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog: CatalogFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;

        debug!(
            "Loaded catalog {} (installed: {}, available sources: {})",
            path.display(),
            catalog.installed.is_some(),
            catalog.available.len()
        );
        Ok(catalog)
    }

    /// Builds the composite source that correlates every source in this catalog.
    pub fn into_composite(self, options: CorrelationOptions) -> Result<CompositeSource> {
        let installed = match self.installed {
            Some(data) => Some(Arc::new(MemorySource::new(data)?) as Arc<dyn Source>),
            None => None,
        };

        let available = self
            .available
            .into_iter()
            .map(|data| MemorySource::new(data).map(|s| Arc::new(s) as Arc<dyn Source>))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Correlating {} available sources{}",
            available.len(),
            if installed.is_some() {
                " with installed packages"
            } else {
                ""
            }
        );

        Ok(CompositeSource::new(
            COMPOSITE_IDENTIFIER,
            installed,
            available,
            options,
        ))
    }
}
