//! In-memory source backed by package data loaded from JSON.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Source, SourceFeature, TrackingCatalog};
use crate::package::reference::{self, fold_case, normalize_name, normalize_publisher};
use crate::package::{
    Manifest, MatchType, Metadata, Package, PackageMatchField, PackageMatchFilter,
    PackageProperty, PackageVersion, PackageVersionKey, PackageVersionMetadata,
    PackageVersionMultiProperty, PackageVersionProperty, ResultMatch, SearchRequest,
    SearchResult, SourceDetails, VersionAndChannel, same_identity,
};

/// Fields a free-form query is matched against.
const QUERY_FIELDS: [PackageMatchField; 4] = [
    PackageMatchField::Id,
    PackageMatchField::Name,
    PackageMatchField::Moniker,
    PackageMatchField::Tag,
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VersionData {
    pub version: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publishers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_family_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upgrade_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locales: Vec<String>,
    #[serde(default)]
    pub arp_min_version: String,
    #[serde(default)]
    pub arp_max_version: String,
    /// Keyed by metadata name, e.g. `TrackingWriteTime` or `installed-type`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
}

impl VersionData {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = channel.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.names.push(name.to_string());
        self
    }

    pub fn with_publisher(mut self, publisher: &str) -> Self {
        self.publishers.push(publisher.to_string());
        self
    }

    pub fn with_package_family_name(mut self, pfn: &str) -> Self {
        self.package_family_names.push(pfn.to_string());
        self
    }

    pub fn with_product_code(mut self, code: &str) -> Self {
        self.product_codes.push(code.to_string());
        self
    }

    pub fn with_upgrade_code(mut self, code: &str) -> Self {
        self.upgrade_codes.push(code.to_string());
        self
    }

    pub fn with_arp_range(mut self, min: &str, max: &str) -> Self {
        self.arp_min_version = min.to_string();
        self.arp_max_version = max.to_string();
        self
    }

    pub fn with_metadata(mut self, key: PackageVersionMetadata, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moniker: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub versions: Vec<VersionData>,
}

impl PackageData {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: VersionData) -> Self {
        self.versions.push(version);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceData {
    pub identifier: String,
    /// Display name; the identifier is used when empty.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<SourceFeature>,
    /// When set, every live search fails with this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,
    #[serde(default)]
    pub packages: Vec<PackageData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<Vec<PackageData>>,
}

impl SourceData {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Default::default()
        }
    }

    pub fn with_package(mut self, package: PackageData) -> Self {
        self.packages.push(package);
        self
    }

    pub fn with_feature(mut self, feature: SourceFeature) -> Self {
        self.features.push(feature);
        self
    }

    pub fn with_tracking(mut self, package: PackageData) -> Self {
        self.tracking.get_or_insert_with(Vec::new).push(package);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail = Some(message.to_string());
        self
    }
}

/// A package version held in memory.
#[derive(Debug)]
pub struct MemoryVersion {
    package_id: String,
    package_name: String,
    source: SourceDetails,
    data: VersionData,
    metadata: Metadata,
}

impl MemoryVersion {
    fn new(
        package_id: &str,
        package_name: &str,
        source: SourceDetails,
        data: VersionData,
    ) -> Result<Self> {
        let metadata = data
            .metadata
            .iter()
            .map(|(key, value)| Ok((key.parse::<PackageVersionMetadata>()?, value.clone())))
            .collect::<Result<Metadata>>()
            .with_context(|| format!("Invalid metadata for {} {}", package_id, data.version))?;

        Ok(Self {
            package_id: package_id.to_string(),
            package_name: package_name.to_string(),
            source,
            data,
            metadata,
        })
    }

    fn version_and_channel(&self) -> VersionAndChannel {
        VersionAndChannel::new(&self.data.version, &self.data.channel)
    }

    fn display_name(&self) -> String {
        self.data
            .names
            .first()
            .cloned()
            .unwrap_or_else(|| self.package_name.clone())
    }
}

impl PackageVersion for MemoryVersion {
    fn property(&self, property: PackageVersionProperty) -> String {
        match property {
            PackageVersionProperty::Id => self.package_id.clone(),
            PackageVersionProperty::Name => self.display_name(),
            PackageVersionProperty::SourceIdentifier => self.source.identifier.clone(),
            PackageVersionProperty::SourceName => self.source.name.clone(),
            PackageVersionProperty::Version => self.data.version.clone(),
            PackageVersionProperty::Channel => self.data.channel.clone(),
            PackageVersionProperty::Publisher => {
                self.data.publishers.first().cloned().unwrap_or_default()
            }
            PackageVersionProperty::ArpMinVersion => self.data.arp_min_version.clone(),
            PackageVersionProperty::ArpMaxVersion => self.data.arp_max_version.clone(),
        }
    }

    fn multi_property(&self, property: PackageVersionMultiProperty) -> Vec<String> {
        match property {
            PackageVersionMultiProperty::PackageFamilyName => self.data.package_family_names.clone(),
            PackageVersionMultiProperty::ProductCode => self.data.product_codes.clone(),
            PackageVersionMultiProperty::UpgradeCode => self.data.upgrade_codes.clone(),
            PackageVersionMultiProperty::Name if self.data.names.is_empty() => {
                vec![self.package_name.clone()]
            }
            PackageVersionMultiProperty::Name => self.data.names.clone(),
            PackageVersionMultiProperty::Publisher => self.data.publishers.clone(),
            PackageVersionMultiProperty::Locale => self.data.locales.clone(),
        }
    }

    fn manifest(&self) -> Result<Manifest> {
        self.data.manifest.clone().with_context(|| {
            format!(
                "No manifest for {} {} in {}",
                self.package_id, self.data.version, self.source.identifier
            )
        })
    }

    fn source(&self) -> SourceDetails {
        self.source.clone()
    }

    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }
}

/// A package held in memory; versions are kept in listing order.
#[derive(Debug)]
pub struct MemoryPackage {
    id: String,
    name: String,
    moniker: Option<String>,
    tags: Vec<String>,
    source: SourceDetails,
    versions: Vec<Arc<MemoryVersion>>,
}

impl MemoryPackage {
    pub fn new(data: PackageData, source: SourceDetails) -> Result<Self> {
        let mut versions = data
            .versions
            .into_iter()
            .map(|v| MemoryVersion::new(&data.id, &data.name, source.clone(), v).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        versions.sort_by(|a, b| a.version_and_channel().listing_order(&b.version_and_channel()));

        Ok(Self {
            id: data.id,
            name: data.name,
            moniker: data.moniker,
            tags: data.tags,
            source,
            versions,
        })
    }

    fn field_values(&self, field: PackageMatchField) -> Vec<String> {
        let from_versions = |property: PackageVersionMultiProperty| -> Vec<String> {
            self.versions
                .iter()
                .flat_map(|v| v.multi_property(property))
                .collect()
        };

        match field {
            PackageMatchField::Id => vec![self.id.clone()],
            PackageMatchField::Name => {
                let mut names = from_versions(PackageVersionMultiProperty::Name);
                names.push(self.name.clone());
                names
            }
            PackageMatchField::Moniker => self.moniker.iter().cloned().collect(),
            PackageMatchField::Tag => self.tags.clone(),
            PackageMatchField::PackageFamilyName => {
                from_versions(PackageVersionMultiProperty::PackageFamilyName)
            }
            PackageMatchField::ProductCode => from_versions(PackageVersionMultiProperty::ProductCode),
            PackageMatchField::UpgradeCode => from_versions(PackageVersionMultiProperty::UpgradeCode),
            PackageMatchField::NormalizedNameAndPublisher
            | PackageMatchField::Command
            | PackageMatchField::Market => Vec::new(),
        }
    }

    fn matches_filter(&self, filter: &PackageMatchFilter) -> bool {
        if filter.field == PackageMatchField::NormalizedNameAndPublisher {
            let name = normalize_name(&filter.value);
            let publisher = normalize_publisher(filter.additional.as_deref().unwrap_or_default());
            return self
                .versions
                .iter()
                .flat_map(|v| reference::for_version(v.as_ref()))
                .any(|r| {
                    r.field == PackageMatchField::NormalizedNameAndPublisher
                        && r.value == name
                        && r.additional.as_deref() == Some(publisher.as_str())
                });
        }

        self.field_values(filter.field)
            .iter()
            .any(|candidate| value_matches(filter.match_type, filter.field, candidate, &filter.value))
    }

    /// Evaluates `(query || inclusions...) && filters...` and returns the
    /// strongest criteria that matched, or `None` when the package is excluded.
    pub fn evaluate(&self, request: &SearchRequest) -> Option<PackageMatchFilter> {
        let mut best: Option<PackageMatchFilter> = None;

        if request.query.is_some() || !request.inclusions.is_empty() {
            let mut anchored = false;

            if let Some(query) = &request.query {
                for field in QUERY_FIELDS {
                    if self
                        .field_values(field)
                        .iter()
                        .any(|candidate| value_matches(query.match_type, field, candidate, &query.value))
                    {
                        anchored = true;
                        keep_stronger(
                            &mut best,
                            PackageMatchFilter::new(field, query.match_type, query.value.clone()),
                        );
                    }
                }
            }

            for inclusion in &request.inclusions {
                if self.matches_filter(inclusion) {
                    anchored = true;
                    keep_stronger(&mut best, inclusion.clone());
                }
            }

            if !anchored {
                return None;
            }
        }

        for filter in &request.filters {
            if !self.matches_filter(filter) {
                return None;
            }
            keep_stronger(&mut best, filter.clone());
        }

        Some(best.unwrap_or_else(PackageMatchFilter::wildcard))
    }
}

impl Package for MemoryPackage {
    fn property(&self, property: PackageProperty) -> String {
        match property {
            PackageProperty::Id => self.id.clone(),
            PackageProperty::Name => self
                .versions
                .first()
                .map(|v| v.display_name())
                .unwrap_or_else(|| self.name.clone()),
        }
    }

    fn version_keys(&self) -> Vec<PackageVersionKey> {
        self.versions
            .iter()
            .map(|v| PackageVersionKey::new(&self.source.identifier, &v.data.version, &v.data.channel))
            .collect()
    }

    fn latest_version(&self) -> Option<Arc<dyn PackageVersion>> {
        self.versions
            .first()
            .map(|v| v.clone() as Arc<dyn PackageVersion>)
    }

    fn version(&self, key: &PackageVersionKey) -> Option<Arc<dyn PackageVersion>> {
        if !key.source_id.is_empty() && key.source_id != self.source.identifier {
            return None;
        }

        self.versions
            .iter()
            .find(|v| {
                v.data.version == key.version && v.data.channel.eq_ignore_ascii_case(&key.channel)
            })
            .map(|v| v.clone() as Arc<dyn PackageVersion>)
    }

    fn source(&self) -> SourceDetails {
        self.source.clone()
    }

    fn is_same(&self, other: &dyn Package) -> bool {
        same_identity(self, other)
    }
}

fn keep_stronger(best: &mut Option<PackageMatchFilter>, candidate: PackageMatchFilter) {
    if best.as_ref().is_none_or(|b| candidate.is_stronger_than(b)) {
        *best = Some(candidate);
    }
}

fn value_matches(match_type: MatchType, field: PackageMatchField, candidate: &str, value: &str) -> bool {
    let folded = || (fold_case(candidate), fold_case(value));
    match match_type {
        // Identity codes are stored case-folded, so exact comparison ignores case for them
        MatchType::Exact if field.is_strong() => {
            let (candidate, value) = folded();
            candidate == value
        }
        MatchType::Exact => candidate == value,
        MatchType::CaseInsensitive => {
            let (candidate, value) = folded();
            candidate == value
        }
        MatchType::StartsWith => {
            let (candidate, value) = folded();
            candidate.starts_with(&value)
        }
        MatchType::Substring => {
            let (candidate, value) = folded();
            candidate.contains(&value)
        }
        MatchType::Fuzzy => fuzzy(candidate) == fuzzy(value),
        MatchType::FuzzySubstring => fuzzy(candidate).contains(&fuzzy(value)),
        MatchType::Wildcard => true,
    }
}

fn fuzzy(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn search_packages(packages: &[Arc<MemoryPackage>], request: &SearchRequest) -> SearchResult {
    let mut matches: Vec<ResultMatch> = packages
        .iter()
        .filter_map(|p| {
            p.evaluate(request)
                .map(|criteria| ResultMatch::new(p.clone() as Arc<dyn Package>, criteria))
        })
        .collect();

    let mut truncated = false;
    if request.maximum_results > 0 && matches.len() > request.maximum_results {
        matches.truncate(request.maximum_results);
        truncated = true;
    }

    SearchResult {
        matches,
        truncated,
        failures: Vec::new(),
    }
}

fn load_packages(data: Vec<PackageData>, source: &SourceDetails) -> Result<Vec<Arc<MemoryPackage>>> {
    data.into_iter()
        .map(|p| {
            let id = p.id.clone();
            MemoryPackage::new(p, source.clone())
                .map(Arc::new)
                .with_context(|| format!("Failed to load package {} into {}", id, source.identifier))
        })
        .collect()
}

struct MemoryTrackingCatalog {
    packages: Vec<Arc<MemoryPackage>>,
}

impl TrackingCatalog for MemoryTrackingCatalog {
    fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        Ok(search_packages(&self.packages, request))
    }
}

/// A source whose packages live in memory.
pub struct MemorySource {
    details: SourceDetails,
    features: Vec<SourceFeature>,
    fail: Option<String>,
    packages: Vec<Arc<MemoryPackage>>,
    tracking: Option<Arc<MemoryTrackingCatalog>>,
}

impl MemorySource {
    pub fn new(data: SourceData) -> Result<Self> {
        if data.identifier.trim().is_empty() {
            anyhow::bail!("Source identifier must not be empty");
        }

        let name = if data.name.is_empty() {
            data.identifier.clone()
        } else {
            data.name
        };
        let details = SourceDetails::new(name, data.identifier);

        let packages = load_packages(data.packages, &details)?;
        let tracking = match data.tracking {
            Some(tracking) => Some(Arc::new(MemoryTrackingCatalog {
                packages: load_packages(tracking, &details)?,
            })),
            None => None,
        };

        debug!(
            "Loaded source {} with {} packages",
            details.identifier,
            packages.len()
        );

        Ok(Self {
            details,
            features: data.features,
            fail: data.fail,
            packages,
            tracking,
        })
    }

    pub fn packages(&self) -> &[Arc<MemoryPackage>] {
        &self.packages
    }
}

impl Source for MemorySource {
    fn identifier(&self) -> String {
        self.details.identifier.clone()
    }

    fn details(&self) -> SourceDetails {
        self.details.clone()
    }

    #[tracing::instrument(skip(self))]
    fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        if let Some(message) = &self.fail {
            anyhow::bail!("{}", message);
        }

        debug!("Searching {} for {}", self.details.identifier, request);
        Ok(search_packages(&self.packages, request))
    }

    fn tracking_catalog(&self) -> Option<Arc<dyn TrackingCatalog>> {
        self.tracking
            .clone()
            .map(|catalog| catalog as Arc<dyn TrackingCatalog>)
    }

    fn query_feature_flag(&self, feature: SourceFeature) -> bool {
        self.features.contains(&feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::SystemReferenceString;

    fn sample_source() -> MemorySource {
        MemorySource::new(
            SourceData::new("store")
                .with_package(
                    PackageData::new("Contoso.Tool", "Contoso Tool")
                        .with_version(
                            VersionData::new("1.0")
                                .with_publisher("Contoso Ltd")
                                .with_product_code("{AAA}"),
                        )
                        .with_version(
                            VersionData::new("2.0")
                                .with_publisher("Contoso Ltd")
                                .with_product_code("{BBB}"),
                        ),
                )
                .with_package(
                    PackageData::new("Fabrikam.Editor", "Fabrikam Editor").with_version(
                        VersionData::new("5.1").with_package_family_name("Fabrikam.Editor_abc"),
                    ),
                )
                .with_package(PackageData::new("Contoso.Other", "Other Thing").with_version(VersionData::new("1"))),
        )
        .unwrap()
    }

    fn ids(result: &SearchResult) -> Vec<String> {
        result
            .matches
            .iter()
            .map(|m| m.package.property(PackageProperty::Id))
            .collect()
    }

    #[test]
    fn test_everything_returns_all_with_wildcard_criteria() {
        let source = sample_source();
        let result = source.search(&SearchRequest::everything()).unwrap();
        assert_eq!(result.matches.len(), 3);
        assert!(result.matches.iter().all(|m| m.match_criteria.match_type == MatchType::Wildcard));
        assert!(!result.truncated);
    }

    #[test]
    fn test_query_matches_id_and_name() {
        let source = sample_source();
        let result = source
            .search(&SearchRequest::with_query(MatchType::Substring, "contoso"))
            .unwrap();
        assert_eq!(ids(&result), vec!["Contoso.Tool", "Contoso.Other"]);
        assert_eq!(result.matches[0].match_criteria.field, PackageMatchField::Id);
    }

    #[test]
    fn test_inclusion_on_product_code_ignores_case() {
        let source = sample_source();
        let reference = SystemReferenceString::new(PackageMatchField::ProductCode, "{bbb}");
        let request = reference::inclusion_request([&reference], Default::default());

        let result = source.search(&request).unwrap();
        assert_eq!(ids(&result), vec!["Contoso.Tool"]);
        assert_eq!(result.matches[0].match_criteria.field, PackageMatchField::ProductCode);
    }

    #[test]
    fn test_inclusion_on_normalized_name_and_publisher() {
        let source = sample_source();
        let reference = SystemReferenceString::name_and_publisher("CONTOSO TOOL (x64)", "Contoso, Ltd.");
        let request = reference::inclusion_request([&reference], Default::default());

        let result = source.search(&request).unwrap();
        assert_eq!(ids(&result), vec!["Contoso.Tool"]);
    }

    #[test]
    fn test_filters_restrict_results() {
        let source = sample_source();
        let mut request = SearchRequest::with_query(MatchType::Substring, "contoso");
        request.filters.push(PackageMatchFilter::new(
            PackageMatchField::Id,
            MatchType::CaseInsensitive,
            "contoso.other",
        ));

        let result = source.search(&request).unwrap();
        assert_eq!(ids(&result), vec!["Contoso.Other"]);
        assert_eq!(result.matches[0].match_criteria.match_type, MatchType::CaseInsensitive);
    }

    #[test]
    fn test_maximum_results_truncates() {
        let source = sample_source();
        let request = SearchRequest {
            maximum_results: 2,
            ..Default::default()
        };
        let result = source.search(&request).unwrap();
        assert_eq!(result.matches.len(), 2);
        assert!(result.truncated);
    }

    #[test]
    fn test_failing_source_errors() {
        let source = MemorySource::new(SourceData::new("broken").failing("catalog offline")).unwrap();
        let err = source.search(&SearchRequest::everything()).err().unwrap();
        assert!(err.to_string().contains("catalog offline"));
    }

    #[test]
    fn test_versions_sorted_highest_first() {
        let source = sample_source();
        let package = &source.packages()[0];
        let keys: Vec<String> = package.version_keys().into_iter().map(|k| k.version).collect();
        assert_eq!(keys, vec!["2.0", "1.0"]);

        let latest = package.latest_version().unwrap();
        assert_eq!(latest.property(PackageVersionProperty::Version), "2.0");
        assert_eq!(latest.property(PackageVersionProperty::SourceIdentifier), "store");
        assert!(latest.manifest().is_err());
    }

    #[test]
    fn test_version_lookup_checks_source() {
        let source = sample_source();
        let package = &source.packages()[0];
        assert!(package.version(&PackageVersionKey::new("store", "1.0", "")).is_some());
        assert!(package.version(&PackageVersionKey::new("", "1.0", "")).is_some());
        assert!(package.version(&PackageVersionKey::new("other", "1.0", "")).is_none());
        assert!(package.version(&PackageVersionKey::new("store", "3.0", "")).is_none());
    }

    #[test]
    fn test_is_same_uses_source_and_id() {
        let a = sample_source();
        let b = sample_source();
        let other = MemorySource::new(
            SourceData::new("other").with_package(PackageData::new("contoso.tool", "x")),
        )
        .unwrap();

        assert!(a.packages()[0].is_same(b.packages()[0].as_ref()));
        assert!(!a.packages()[0].is_same(a.packages()[1].as_ref()));
        assert!(!a.packages()[0].is_same(other.packages()[0].as_ref()));
    }

    #[test]
    fn test_invalid_metadata_key_is_rejected() {
        let mut version = VersionData::new("1.0");
        version.metadata.insert("NotAKey".into(), "x".into());
        let result = MemorySource::new(
            SourceData::new("installed").with_package(PackageData::new("A", "A").with_version(version)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_tracking_catalog_and_features() {
        let source = MemorySource::new(
            SourceData::new("store")
                .with_feature(SourceFeature::InstalledCorrelationSearch)
                .with_tracking(PackageData::new("Gone.Package", "Gone").with_version(
                    VersionData::new("1.0").with_metadata(PackageVersionMetadata::TrackingWriteTime, "42"),
                )),
        )
        .unwrap();

        assert!(source.query_feature_flag(SourceFeature::InstalledCorrelationSearch));
        assert!(!source.query_feature_flag(SourceFeature::ManifestMayContainAdditionalSystemReferenceStrings));

        let catalog = source.tracking_catalog().unwrap();
        let result = catalog.search(&SearchRequest::everything()).unwrap();
        assert_eq!(result.matches.len(), 1);
        let latest = result.matches[0].package.latest_version().unwrap();
        assert_eq!(crate::package::tracking_write_time(&latest.metadata()), 42);
        assert!(source.search(&SearchRequest::everything()).unwrap().matches.is_empty());
    }

    #[test]
    fn test_source_data_from_json() {
        let data: SourceData = serde_json::from_str(
            r#"{
                "identifier": "installed",
                "packages": [
                    {
                        "id": "ARP\\Machine\\X64\\Tool",
                        "name": "Tool",
                        "versions": [
                            { "version": "1.0.5.0", "productCodes": ["{A}"], "metadata": { "InstalledType": "msi" } }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        let source = MemorySource::new(data).unwrap();
        assert_eq!(source.details().name, "installed");
        let version = source.packages()[0].latest_version().unwrap();
        assert_eq!(
            version.metadata().get(&PackageVersionMetadata::InstalledType).map(String::as_str),
            Some("msi")
        );
        assert_eq!(version.multi_property(PackageVersionMultiProperty::Name), vec!["Tool"]);
    }
}
