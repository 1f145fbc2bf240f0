//! Value types shared by every source: match fields, search requests and
//! results, version keys and property identifiers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::handle::Package;

/// How a filter value is compared against package data.
///
/// Declared in order of preference: lower variants are stronger matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    Exact,
    CaseInsensitive,
    StartsWith,
    Fuzzy,
    Substring,
    FuzzySubstring,
    Wildcard,
}

/// The package field a filter applies to.
///
/// Declared in order of preference in search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageMatchField {
    Id,
    Name,
    Moniker,
    Command,
    Tag,
    PackageFamilyName,
    ProductCode,
    UpgradeCode,
    NormalizedNameAndPublisher,
    Market,
}

impl PackageMatchField {
    /// Strong fields identify a package on their own; weak fields need corroboration.
    pub fn is_strong(self) -> bool {
        matches!(
            self,
            PackageMatchField::PackageFamilyName
                | PackageMatchField::ProductCode
                | PackageMatchField::UpgradeCode
        )
    }
}

impl fmt::Display for PackageMatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageMatchField::Id => "id",
            PackageMatchField::Name => "name",
            PackageMatchField::Moniker => "moniker",
            PackageMatchField::Command => "command",
            PackageMatchField::Tag => "tag",
            PackageMatchField::PackageFamilyName => "package-family-name",
            PackageMatchField::ProductCode => "product-code",
            PackageMatchField::UpgradeCode => "upgrade-code",
            PackageMatchField::NormalizedNameAndPublisher => "normalized-name-and-publisher",
            PackageMatchField::Market => "market",
        };
        f.write_str(name)
    }
}

/// A free-form query value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMatch {
    pub match_type: MatchType,
    pub value: String,
}

impl RequestMatch {
    pub fn new(match_type: MatchType, value: impl Into<String>) -> Self {
        Self {
            match_type,
            value: value.into(),
        }
    }
}

/// A match on a specific field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageMatchFilter {
    pub field: PackageMatchField,
    pub match_type: MatchType,
    pub value: String,
    /// Second value; only used by [`PackageMatchField::NormalizedNameAndPublisher`].
    pub additional: Option<String>,
}

impl PackageMatchFilter {
    pub fn new(field: PackageMatchField, match_type: MatchType, value: impl Into<String>) -> Self {
        let additional = match field {
            PackageMatchField::NormalizedNameAndPublisher => Some(String::new()),
            _ => None,
        };
        Self {
            field,
            match_type,
            value: value.into(),
            additional,
        }
    }

    pub fn with_additional(
        field: PackageMatchField,
        match_type: MatchType,
        value: impl Into<String>,
        additional: impl Into<String>,
    ) -> Self {
        Self {
            field,
            match_type,
            value: value.into(),
            additional: Some(additional.into()),
        }
    }

    /// Criteria used for results that matched everything.
    pub fn wildcard() -> Self {
        Self::new(PackageMatchField::Id, MatchType::Wildcard, "")
    }

    /// Ordering used to rank results: match type first, then field.
    pub fn strength_order(&self, other: &Self) -> std::cmp::Ordering {
        self.match_type
            .cmp(&other.match_type)
            .then_with(|| self.field.cmp(&other.field))
    }

    /// Whether this criteria ranks strictly ahead of `other`.
    pub fn is_stronger_than(&self, other: &Self) -> bool {
        self.strength_order(other) == std::cmp::Ordering::Less
    }
}

/// Why a search is being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPurpose {
    #[default]
    Default,
    /// Installed reference strings searched against an available source.
    CorrelationToAvailable,
    /// Available reference strings searched against the installed source.
    CorrelationToInstalled,
}

/// A search request.
///
/// Evaluated as `(query || inclusions...) && filters...`. With neither a
/// query nor inclusions the starting set is every package in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: Option<RequestMatch>,
    pub inclusions: Vec<PackageMatchFilter>,
    pub filters: Vec<PackageMatchFilter>,
    /// Zero places no limit.
    pub maximum_results: usize,
    pub purpose: SearchPurpose,
}

impl SearchRequest {
    /// Request that matches every package.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn with_query(match_type: MatchType, value: impl Into<String>) -> Self {
        Self {
            query: Some(RequestMatch::new(match_type, value)),
            ..Default::default()
        }
    }

    pub fn is_for_everything(&self) -> bool {
        self.query.is_none() && self.inclusions.is_empty() && self.filters.is_empty()
    }
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_for_everything() {
            return f.write_str("everything");
        }

        let mut parts = Vec::new();
        if let Some(query) = &self.query {
            parts.push(format!("query[{:?}]={}", query.match_type, query.value));
        }
        for inclusion in &self.inclusions {
            parts.push(format!("include[{}]={}", inclusion.field, inclusion.value));
        }
        for filter in &self.filters {
            parts.push(format!("filter[{}]={}", filter.field, filter.value));
        }
        f.write_str(&parts.join(" "))
    }
}

/// A single result from a search.
#[derive(Clone)]
pub struct ResultMatch {
    pub package: Arc<dyn Package>,
    /// The highest order field on which the package matched the search.
    pub match_criteria: PackageMatchFilter,
}

impl ResultMatch {
    pub fn new(package: Arc<dyn Package>, match_criteria: PackageMatchFilter) -> Self {
        Self {
            package,
            match_criteria,
        }
    }
}

/// A source that failed while serving part of a search.
#[derive(Debug)]
pub struct SearchFailure {
    pub source_name: String,
    pub error: anyhow::Error,
}

/// Search result data from a single source.
#[derive(Default)]
pub struct SearchResult {
    pub matches: Vec<ResultMatch>,
    /// Set when the results were cut at the request's maximum.
    pub truncated: bool,
    /// Failures a source chose to report instead of failing the whole search.
    pub failures: Vec<SearchFailure>,
}

/// Identifies a version within a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PackageVersionKey {
    pub source_id: String,
    pub version: String,
    pub channel: String,
    /// Keeps keys unique when several installed packages report the same version.
    pub disambiguator: Option<String>,
}

impl PackageVersionKey {
    pub fn new(
        source_id: impl Into<String>,
        version: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            version: version.into(),
            channel: channel.into(),
            disambiguator: None,
        }
    }

    pub fn version_and_channel(&self) -> super::VersionAndChannel {
        super::VersionAndChannel::new(&self.version, &self.channel)
    }
}

/// A property of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageProperty {
    Id,
    Name,
}

/// A property of a package version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageVersionProperty {
    Id,
    Name,
    SourceIdentifier,
    SourceName,
    Version,
    Channel,
    Publisher,
    ArpMinVersion,
    ArpMaxVersion,
}

/// A property of a package version that can have multiple values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageVersionMultiProperty {
    PackageFamilyName,
    ProductCode,
    UpgradeCode,
    Name,
    Publisher,
    Locale,
}

/// A persisted metadata item of a package version; mostly describes installed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackageVersionMetadata {
    InstalledType,
    InstalledScope,
    InstalledLocation,
    Publisher,
    InstalledLocale,
    TrackingWriteTime,
    InstalledArchitecture,
    PinnedState,
    UserIntentArchitecture,
    UserIntentLocale,
}

impl FromStr for PackageVersionMetadata {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "installedtype" => PackageVersionMetadata::InstalledType,
            "installedscope" => PackageVersionMetadata::InstalledScope,
            "installedlocation" => PackageVersionMetadata::InstalledLocation,
            "publisher" => PackageVersionMetadata::Publisher,
            "installedlocale" => PackageVersionMetadata::InstalledLocale,
            "trackingwritetime" => PackageVersionMetadata::TrackingWriteTime,
            "installedarchitecture" => PackageVersionMetadata::InstalledArchitecture,
            "pinnedstate" => PackageVersionMetadata::PinnedState,
            "userintentarchitecture" => PackageVersionMetadata::UserIntentArchitecture,
            "userintentlocale" => PackageVersionMetadata::UserIntentLocale,
            _ => anyhow::bail!("Unknown package version metadata: {}", s),
        };
        Ok(value)
    }
}

impl fmt::Display for PackageVersionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub type Metadata = BTreeMap<PackageVersionMetadata, String>;

/// Reads the tracking write time recorded in `metadata`, 0 when absent or malformed.
pub fn tracking_write_time(metadata: &Metadata) -> i64 {
    metadata
        .get(&PackageVersionMetadata::TrackingWriteTime)
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(0)
}

/// Installer technology of an installed package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallerType {
    #[default]
    Unknown,
    Inno,
    Wix,
    Msi,
    Nullsoft,
    Zip,
    Msix,
    Exe,
    Burn,
    MsStore,
    Portable,
}

impl InstallerType {
    /// Installers whose reported versions can be remapped through declared ARP ranges.
    pub fn supports_arp_version_range(self) -> bool {
        matches!(
            self,
            InstallerType::Exe
                | InstallerType::Inno
                | InstallerType::Msi
                | InstallerType::Nullsoft
                | InstallerType::Wix
                | InstallerType::Burn
        )
    }
}

impl FromStr for InstallerType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s.trim().to_lowercase().as_str() {
            "inno" => InstallerType::Inno,
            "wix" => InstallerType::Wix,
            "msi" => InstallerType::Msi,
            "nullsoft" => InstallerType::Nullsoft,
            "zip" => InstallerType::Zip,
            "msix" | "appx" => InstallerType::Msix,
            "exe" => InstallerType::Exe,
            "burn" => InstallerType::Burn,
            "msstore" => InstallerType::MsStore,
            "portable" => InstallerType::Portable,
            "" | "unknown" => InstallerType::Unknown,
            _ => anyhow::bail!("Unknown installer type: {}", s),
        };
        Ok(value)
    }
}

/// Identity of the source a package or version belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceDetails {
    pub name: String,
    pub identifier: String,
}

impl SourceDetails {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
        }
    }
}
