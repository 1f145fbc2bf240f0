//! Maps an installer-reported version onto the version scheme of a catalog,
//! using the installed-version (ARP) ranges the catalog declares per version.

use log::debug;

use crate::package::{
    ApproximateComparator, Package, PackageVersionProperty, Version, VersionRange,
};

struct ArpRange {
    manifest_version: Version,
    range: VersionRange,
}

/// Returns the catalog version whose declared range contains
/// `installed_version`, an approximation ("< x" / "> x") when the ranges are
/// strictly ordered but none contains it, or the input unchanged.
pub fn map_installed_version(installed_version: &str, available: &dyn Package) -> String {
    let unchanged = || installed_version.to_string();

    let Some(latest) = available.latest_version() else {
        return unchanged();
    };

    let latest_min = latest.property(PackageVersionProperty::ArpMinVersion);
    let latest_max = latest.property(PackageVersionProperty::ArpMaxVersion);
    if latest_min.is_empty() || latest_max.is_empty() {
        return unchanged();
    }
    let latest_version = Version::new(&latest.property(PackageVersionProperty::Version));
    if VersionRange::new(Version::new(&latest_min), Version::new(&latest_max))
        .is_same_as_single_version(&latest_version)
    {
        return unchanged();
    }

    let mut ranges = collect_ranges(available);
    if ranges
        .iter()
        .all(|r| r.range.is_same_as_single_version(&r.manifest_version))
    {
        return unchanged();
    }

    ranges.sort_by(|a, b| b.manifest_version.cmp(&a.manifest_version));
    let is_descending = ranges.windows(2).all(|w| w[0].range.min > w[1].range.max);

    let installed = Version::new(installed_version);

    if let Some(hit) = ranges.iter().find(|r| r.range.contains(&installed)) {
        return hit.manifest_version.to_string();
    }

    if !is_descending {
        debug!(
            "ARP ranges of {} overlap; not approximating {}",
            available.property(crate::package::PackageProperty::Id),
            installed_version
        );
        return unchanged();
    }

    let mut below: Option<&ArpRange> = None;
    for candidate in ranges.iter().rev() {
        if candidate.range.min > installed {
            return approximate(&candidate.manifest_version, ApproximateComparator::LessThan)
                .unwrap_or_else(unchanged);
        }
        below = Some(candidate);
    }

    below
        .and_then(|r| approximate(&r.manifest_version, ApproximateComparator::GreaterThan))
        .unwrap_or_else(unchanged)
}

fn collect_ranges(available: &dyn Package) -> Vec<ArpRange> {
    available
        .version_keys()
        .iter()
        .filter_map(|key| available.version(key))
        .filter_map(|version| {
            let manifest_version = Version::new(&version.property(PackageVersionProperty::Version));
            if manifest_version.is_empty() || manifest_version.is_unknown() {
                return None;
            }

            let min = version.property(PackageVersionProperty::ArpMinVersion);
            let max = version.property(PackageVersionProperty::ArpMaxVersion);
            if min.is_empty() || max.is_empty() {
                return None;
            }

            Some(ArpRange {
                manifest_version,
                range: VersionRange::new(Version::new(&min), Version::new(&max)),
            })
        })
        .collect()
}

fn approximate(base: &Version, comparator: ApproximateComparator) -> Option<String> {
    match Version::approximate(base, comparator) {
        Ok(version) => Some(version.to_string()),
        Err(e) => {
            debug!("Cannot approximate {}: {:#}", base, e);
            None
        }
    }
}
