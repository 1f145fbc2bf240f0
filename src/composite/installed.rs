//! Merged view over one or more installed package handles that share identity.

use anyhow::Result;
use log::{debug, warn};
use std::sync::Arc;

use super::arp::map_installed_version;
use crate::package::{
    InstallerType, Manifest, Metadata, Package, PackageProperty, PackageVersion,
    PackageVersionKey, PackageVersionMetadata, PackageVersionMultiProperty,
    PackageVersionProperty, SourceDetails,
};

/// Metadata copied from the tracking package when the installed side lacks it.
const BACKFILLED_METADATA: [PackageVersionMetadata; 5] = [
    PackageVersionMetadata::InstalledArchitecture,
    PackageVersionMetadata::InstalledLocale,
    PackageVersionMetadata::UserIntentArchitecture,
    PackageVersionMetadata::UserIntentLocale,
    PackageVersionMetadata::PinnedState,
];

struct InstalledEntry {
    /// Key exposed to callers; the disambiguator names the owning handle.
    key: PackageVersionKey,
    /// Key understood by the owning handle.
    original_key: PackageVersionKey,
    owner: usize,
    installed_type: InstallerType,
    mapped_version: Option<String>,
}

impl InstalledEntry {
    fn remap(&mut self, available: Option<&dyn Package>) {
        self.mapped_version = match available {
            Some(available) if self.installed_type.supports_arp_version_range() => {
                Some(map_installed_version(&self.original_key.version, available))
            }
            _ => None,
        };
    }
}

struct Tracking {
    source: SourceDetails,
    package: Arc<dyn Package>,
    write_time: i64,
}

/// Installed side of a composite package.
pub struct CompositeInstalledPackage {
    underlying: Vec<Arc<dyn Package>>,
    entries: Vec<InstalledEntry>,
    override_available: Option<Arc<dyn Package>>,
    tracking: Option<Tracking>,
}

impl CompositeInstalledPackage {
    pub fn new(installed: Arc<dyn Package>) -> Self {
        let mut package = Self {
            underlying: Vec::new(),
            entries: Vec::new(),
            override_available: None,
            tracking: None,
        };
        package.add_underlying(installed);
        package
    }

    /// Adds another installed handle. Handles that report no versions are
    /// logged and ignored.
    pub fn add_underlying(&mut self, installed: Arc<dyn Package>) {
        let owner_id = installed.property(PackageProperty::Id);
        let keys = installed.version_keys();
        if keys.is_empty() {
            warn!("Installed package {} reported no versions; ignoring it", owner_id);
            return;
        }

        let owner = self.underlying.len();
        for original_key in keys {
            let installed_type = installed
                .version(&original_key)
                .and_then(|v| {
                    v.metadata()
                        .get(&PackageVersionMetadata::InstalledType)
                        .and_then(|t| t.parse::<InstallerType>().ok())
                })
                .unwrap_or_default();

            let mut entry = InstalledEntry {
                key: PackageVersionKey {
                    disambiguator: Some(owner_id.clone()),
                    ..original_key.clone()
                },
                original_key,
                owner,
                installed_type,
                mapped_version: None,
            };
            entry.remap(self.override_available.as_deref());
            self.entries.push(entry);
        }
        self.underlying.push(installed);

        // Stable so equal versions keep the order their handles were added in
        self.entries.sort_by(|a, b| {
            a.original_key
                .version_and_channel()
                .listing_order(&b.original_key.version_and_channel())
        });
    }

    /// Sets the available package used to remap installed versions.
    pub fn set_override_version(&mut self, available: Arc<dyn Package>) {
        debug!(
            "Mapping installed versions of {} through {}",
            self.property(PackageProperty::Id),
            available.property(PackageProperty::Id)
        );
        for entry in &mut self.entries {
            entry.remap(Some(available.as_ref()));
        }
        self.override_available = Some(available);
    }

    pub fn set_tracking(&mut self, source: SourceDetails, package: Arc<dyn Package>, write_time: i64) {
        self.tracking = Some(Tracking {
            source,
            package,
            write_time,
        });
    }

    /// Write time of the tracking record, 0 when untracked.
    pub fn tracking_write_time(&self) -> i64 {
        self.tracking.as_ref().map_or(0, |t| t.write_time)
    }

    pub fn tracking_source(&self) -> Option<&SourceDetails> {
        self.tracking.as_ref().map(|t| &t.source)
    }

    pub fn tracking_package(&self) -> Option<&Arc<dyn Package>> {
        self.tracking.as_ref().map(|t| &t.package)
    }

    pub fn underlying(&self) -> &[Arc<dyn Package>] {
        &self.underlying
    }

    /// True when no handle contributed a version; such composites must be dropped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_underlying(&self, installed: &dyn Package) -> bool {
        self.underlying.iter().any(|u| u.is_same(installed))
    }

    /// Merges the handles of `other` into this package.
    pub fn fold_in(&mut self, other: CompositeInstalledPackage) {
        for installed in other.underlying {
            if self.contains_underlying(installed.as_ref()) {
                continue;
            }
            self.add_underlying(installed);
        }

        if let Some(tracking) = other.tracking {
            if tracking.write_time > self.tracking_write_time() {
                self.tracking = Some(tracking);
            }
        }
    }

    /// Resolves `key` to the owning handle's version, decorated with the
    /// mapped version, tracking source and backfilled metadata.
    pub fn version_for(&self, key: &PackageVersionKey) -> Option<CompositeInstalledVersion> {
        let entry = self.entries.iter().find(|e| &e.key == key).or_else(|| {
            // Undisambiguated keys resolve to the first matching version
            key.disambiguator.is_none().then(|| {
                self.entries.iter().find(|e| {
                    e.original_key.version == key.version
                        && e.original_key.channel.eq_ignore_ascii_case(&key.channel)
                })
            })?
        })?;

        let inner = self.underlying[entry.owner].version(&entry.original_key)?;
        let backfill = self
            .tracking
            .as_ref()
            .and_then(|t| t.package.latest_version())
            .map(|v| v.metadata())
            .unwrap_or_default();

        Some(CompositeInstalledVersion {
            inner,
            mapped_version: entry.mapped_version.clone(),
            tracking_source: self.tracking_source().cloned(),
            backfill,
        })
    }

    /// The installed type recorded for `key`.
    pub fn installed_type(&self, key: &PackageVersionKey) -> Option<InstallerType> {
        self.entries
            .iter()
            .find(|e| &e.key == key)
            .map(|e| e.installed_type)
    }
}

impl Package for CompositeInstalledPackage {
    fn property(&self, property: PackageProperty) -> String {
        self.entries
            .first()
            .map(|e| self.underlying[e.owner].property(property))
            .unwrap_or_default()
    }

    fn version_keys(&self) -> Vec<PackageVersionKey> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    fn latest_version(&self) -> Option<Arc<dyn PackageVersion>> {
        let key = &self.entries.first()?.key;
        self.version(key)
    }

    fn version(&self, key: &PackageVersionKey) -> Option<Arc<dyn PackageVersion>> {
        self.version_for(key)
            .map(|v| Arc::new(v) as Arc<dyn PackageVersion>)
    }

    fn source(&self) -> SourceDetails {
        match &self.tracking {
            Some(tracking) => tracking.source.clone(),
            None => self
                .entries
                .first()
                .map(|e| self.underlying[e.owner].source())
                .unwrap_or_default(),
        }
    }

    fn is_same(&self, other: &dyn Package) -> bool {
        self.contains_underlying(other)
    }
}

/// An installed version as seen through a composite package.
pub struct CompositeInstalledVersion {
    inner: Arc<dyn PackageVersion>,
    mapped_version: Option<String>,
    tracking_source: Option<SourceDetails>,
    backfill: Metadata,
}

impl CompositeInstalledVersion {
    /// The version reported by the installer, before any mapping.
    pub fn reported_version(&self) -> String {
        self.inner.property(PackageVersionProperty::Version)
    }
}

impl PackageVersion for CompositeInstalledVersion {
    fn property(&self, property: PackageVersionProperty) -> String {
        match (property, &self.mapped_version, &self.tracking_source) {
            (PackageVersionProperty::Version, Some(mapped), _) => mapped.clone(),
            (PackageVersionProperty::SourceIdentifier, _, Some(source)) => source.identifier.clone(),
            (PackageVersionProperty::SourceName, _, Some(source)) => source.name.clone(),
            _ => self.inner.property(property),
        }
    }

    fn multi_property(&self, property: PackageVersionMultiProperty) -> Vec<String> {
        self.inner.multi_property(property)
    }

    fn manifest(&self) -> Result<Manifest> {
        self.inner.manifest()
    }

    fn source(&self) -> SourceDetails {
        self.tracking_source
            .clone()
            .unwrap_or_else(|| self.inner.source())
    }

    fn metadata(&self) -> Metadata {
        let mut metadata = self.inner.metadata();
        for key in BACKFILLED_METADATA {
            if metadata.contains_key(&key) {
                continue;
            }
            if let Some(value) = self.backfill.get(&key) {
                metadata.insert(key, value.clone());
            }
        }
        metadata
    }
}
