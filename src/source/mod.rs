//! Source abstraction for package repositories.
//!
//! A source is one independently queried repository: either the installed
//! repository describing the local machine or an available catalog. The
//! correlation engine only talks to sources through the traits here.

mod catalog;
mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::package::{SearchRequest, SearchResult, SourceDetails};

pub use catalog::CatalogFile;
pub use memory::{MemoryPackage, MemorySource, MemoryVersion, PackageData, SourceData, VersionData};

/// Optional capabilities a source may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFeature {
    /// Manifests can carry reference strings the package versions do not report.
    ManifestMayContainAdditionalSystemReferenceStrings,
    /// The source can be searched with installed reference strings.
    InstalledCorrelationSearch,
}

impl fmt::Display for SourceFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFeature::ManifestMayContainAdditionalSystemReferenceStrings => {
                write!(f, "manifest-may-contain-additional-system-reference-strings")
            }
            SourceFeature::InstalledCorrelationSearch => write!(f, "installed-correlation-search"),
        }
    }
}

impl FromStr for SourceFeature {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manifest-may-contain-additional-system-reference-strings" => {
                Ok(SourceFeature::ManifestMayContainAdditionalSystemReferenceStrings)
            }
            "installed-correlation-search" => Ok(SourceFeature::InstalledCorrelationSearch),
            _ => anyhow::bail!("Unknown source feature: {}", s),
        }
    }
}

/// Local history of package associations previously observed for a source.
#[cfg_attr(test, mockall::automock)]
pub trait TrackingCatalog: Send + Sync {
    fn search(&self, request: &SearchRequest) -> Result<SearchResult>;
}

/// Trait for package repositories.
///
/// Implementations may fail any search; the engine decides whether that
/// failure is fatal (installed repository) or recorded (available sources).
#[cfg_attr(test, mockall::automock)]
pub trait Source: Send + Sync {
    /// Stable identifier, used to de-duplicate failures and to group results.
    fn identifier(&self) -> String;

    /// Name and identifier reported to callers.
    fn details(&self) -> SourceDetails;

    /// Run a search against this source.
    fn search(&self, request: &SearchRequest) -> Result<SearchResult>;

    /// Get the tracking catalog, if this source keeps one.
    fn tracking_catalog(&self) -> Option<Arc<dyn TrackingCatalog>>;

    /// Whether this source declares `feature`.
    fn query_feature_flag(&self, feature: SourceFeature) -> bool;
}
