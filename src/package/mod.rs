//! Package data model
//!
//! This module provides the abstractions every source speaks: package and
//! version handles, search requests and results, manifests, versions and the
//! reference strings used to recognize one package across sources.

mod handle;
mod manifest;
mod model;
pub mod reference;
mod version;

pub use handle::{Package, PackageVersion, same_identity};
pub use manifest::{AppsAndFeaturesEntry, Manifest, ManifestInstaller};
pub use model::{
    InstallerType, MatchType, Metadata, PackageMatchField, PackageMatchFilter, PackageProperty,
    PackageVersionKey, PackageVersionMetadata, PackageVersionMultiProperty,
    PackageVersionProperty, RequestMatch, ResultMatch, SearchFailure, SearchPurpose,
    SearchRequest, SearchResult, SourceDetails, tracking_write_time,
};
pub use reference::SystemReferenceString;
pub use version::{ApproximateComparator, Channel, Version, VersionAndChannel, VersionRange};
