//! Capabilities every package handle exposes, whichever source it came from.

use anyhow::Result;
use std::sync::Arc;

use super::manifest::Manifest;
use super::model::{
    Metadata, PackageProperty, PackageVersionKey, PackageVersionMultiProperty,
    PackageVersionProperty, SourceDetails,
};

/// A single version of a package.
pub trait PackageVersion: Send + Sync {
    /// Gets a property of this version; empty when the property is not set.
    fn property(&self, property: PackageVersionProperty) -> String;

    /// Gets a property that can have multiple values.
    fn multi_property(&self, property: PackageVersionMultiProperty) -> Vec<String>;

    /// Gets the manifest of this version. Only available packages carry one.
    fn manifest(&self) -> Result<Manifest>;

    /// Gets the source this version reports as its origin.
    fn source(&self) -> SourceDetails;

    /// Gets persisted metadata; mostly describes installed state.
    fn metadata(&self) -> Metadata;
}

/// A package as seen by one source.
///
/// Handles may be independent views over the same logical package, so
/// identity is decided by [`Package::is_same`] rather than by pointer.
pub trait Package: Send + Sync {
    /// Gets a property of this package.
    fn property(&self, property: PackageProperty) -> String;

    /// Gets the keys of every version, sorted highest first.
    fn version_keys(&self) -> Vec<PackageVersionKey>;

    /// Gets the highest version.
    fn latest_version(&self) -> Option<Arc<dyn PackageVersion>>;

    /// Gets the version identified by `key`.
    fn version(&self, key: &PackageVersionKey) -> Option<Arc<dyn PackageVersion>>;

    /// Gets the source the package belongs to.
    fn source(&self) -> SourceDetails;

    /// Determines whether `other` refers to the same package as this one.
    fn is_same(&self, other: &dyn Package) -> bool;
}

/// Identity shared by the handles in this crate: same source and same
/// package identifier, ignoring case.
pub fn same_identity(a: &dyn Package, b: &dyn Package) -> bool {
    a.source().identifier == b.source().identifier
        && a.property(PackageProperty::Id)
            .eq_ignore_ascii_case(&b.property(PackageProperty::Id))
}
