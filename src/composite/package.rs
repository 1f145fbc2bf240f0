//! A composite package: the installed side paired with every available
//! package correlated to it.

use anyhow::Result;
use std::sync::Arc;

use super::installed::CompositeInstalledPackage;
use crate::package::{
    Package, PackageProperty, PackageVersion, PackageVersionKey, PackageVersionProperty,
    SourceDetails, VersionAndChannel,
};

#[derive(Default)]
pub struct CompositePackage {
    installed: Option<CompositeInstalledPackage>,
    available: Vec<Arc<dyn Package>>,
    /// Index into `available`.
    primary: Option<usize>,
}

impl CompositePackage {
    pub fn with_installed(installed: CompositeInstalledPackage) -> Self {
        Self {
            installed: Some(installed),
            ..Default::default()
        }
    }

    pub fn with_available(available: Arc<dyn Package>) -> Self {
        let mut package = Self::default();
        package.add_available(available, false);
        package
    }

    pub fn installed(&self) -> Option<&CompositeInstalledPackage> {
        self.installed.as_ref()
    }

    pub fn available(&self) -> &[Arc<dyn Package>] {
        &self.available
    }

    /// Adds an available package. The first one added, or one made primary,
    /// becomes the reference for mapping installed versions.
    pub fn add_available(&mut self, available: Arc<dyn Package>, make_primary: bool) {
        let first = self.available.is_empty();
        self.available.push(available.clone());

        if make_primary || first {
            if let Some(installed) = &mut self.installed {
                installed.set_override_version(available);
            }
        }
        if make_primary {
            self.primary = Some(self.available.len() - 1);
        }
    }

    pub fn primary_available(&self) -> Option<&Arc<dyn Package>> {
        self.primary.and_then(|i| self.available.get(i))
    }

    /// Records the catalog that most recently tracked the installed package.
    /// Does nothing without an installed side.
    pub fn set_tracking(&mut self, source: SourceDetails, package: Arc<dyn Package>, write_time: i64) {
        if let Some(installed) = &mut self.installed {
            installed.set_tracking(source, package, write_time);
        }
    }

    pub fn tracking_write_time(&self) -> i64 {
        self.installed
            .as_ref()
            .map_or(0, CompositeInstalledPackage::tracking_write_time)
    }

    /// Merges the installed side of `other` into this package.
    pub fn fold_in(&mut self, other: CompositePackage) {
        let Some(other_installed) = other.installed else {
            return;
        };

        if let Some(installed) = &mut self.installed {
            installed.fold_in(other_installed);
            return;
        }

        let mut installed = other_installed;
        if let Some(reference) = self.primary_available().or(self.available.first()) {
            installed.set_override_version(reference.clone());
        }
        self.installed = Some(installed);
    }

    /// Resolves a display property: primary available, then first available,
    /// then installed. The first non-empty value wins.
    pub fn property(&self, property: PackageProperty) -> Result<String> {
        let candidates: [Option<&dyn Package>; 3] = [
            self.primary_available().map(|p| p.as_ref()),
            self.available.first().map(|p| p.as_ref()),
            self.installed.as_ref().map(|i| i as &dyn Package),
        ];

        if candidates.iter().all(Option::is_none) {
            anyhow::bail!("Composite package has neither an installed nor an available package");
        }

        Ok(candidates
            .into_iter()
            .flatten()
            .map(|p| p.property(property))
            .find(|value| !value.is_empty())
            .unwrap_or_default())
    }

    pub fn contains_available(&self, available: &dyn Package) -> bool {
        self.available.iter().any(|a| a.is_same(available))
    }

    pub fn has_available_from_source(&self, source_identifier: &str) -> bool {
        self.available
            .iter()
            .any(|a| a.source().identifier == source_identifier)
    }

    pub fn installed_version(&self) -> Option<Arc<dyn PackageVersion>> {
        self.installed.as_ref()?.latest_version()
    }

    /// Version keys of every available package in listing order; equal
    /// versions keep the order their packages were added in.
    pub fn available_version_keys(&self) -> Vec<PackageVersionKey> {
        if let [only] = self.available.as_slice() {
            return only.version_keys();
        }

        let mut keys: Vec<(VersionAndChannel, PackageVersionKey)> = self
            .available
            .iter()
            .flat_map(|a| a.version_keys())
            .map(|key| (key.version_and_channel(), key))
            .collect();
        keys.sort_by(|a, b| a.0.listing_order(&b.0));
        keys.into_iter().map(|(_, key)| key).collect()
    }

    /// The highest latest version across available packages.
    pub fn latest_available_version(&self) -> Option<Arc<dyn PackageVersion>> {
        let mut result: Option<(VersionAndChannel, Arc<dyn PackageVersion>)> = None;

        for latest in self.available.iter().filter_map(|a| a.latest_version()) {
            let version = version_and_channel(latest.as_ref());
            let newer = result
                .as_ref()
                .is_none_or(|(current, _)| current.version < version.version);
            if newer {
                result = Some((version, latest));
            }
        }

        result.map(|(_, version)| version)
    }

    pub fn available_version(&self, key: &PackageVersionKey) -> Option<Arc<dyn PackageVersion>> {
        self.available.iter().find_map(|a| a.version(key))
    }

    /// Whether the latest available version is newer than the installed one
    /// on the same channel.
    pub fn is_update_available(&self) -> bool {
        let (Some(installed), Some(available)) =
            (self.installed_version(), self.latest_available_version())
        else {
            return false;
        };

        version_and_channel(installed.as_ref()).is_updated_by(&version_and_channel(available.as_ref()))
    }
}

fn version_and_channel(version: &dyn PackageVersion) -> VersionAndChannel {
    VersionAndChannel::new(
        &version.property(PackageVersionProperty::Version),
        &version.property(PackageVersionProperty::Channel),
    )
}
