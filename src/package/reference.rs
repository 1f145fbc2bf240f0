//! System reference strings: normalized identity facts used to recognize the
//! same package across independently queried sources.

use std::collections::BTreeSet;

use super::handle::{Package, PackageVersion};
use super::manifest::Manifest;
use super::model::{
    MatchType, PackageMatchField, PackageMatchFilter, PackageVersionMultiProperty,
    PackageVersionProperty, SearchPurpose, SearchRequest,
};

/// Words dropped from package names; they describe the build, not the product.
const NAME_NOISE: &[&str] = &[
    "x64", "x86", "x86_64", "amd64", "arm", "arm64", "aarch64", "64bit", "32bit", "64-bit",
    "32-bit", "win64", "win32",
];

/// Legal-entity suffixes dropped from publishers.
const PUBLISHER_NOISE: &[&str] = &[
    "inc", "incorporated", "corp", "corporation", "llc", "ltd", "limited", "co", "company",
    "gmbh", "ag", "sa", "bv", "plc", "pty", "srl", "sarl", "oy", "ab",
];

/// A `(field, value, additional?)` identity fact. Values are case-folded on
/// construction so equality is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemReferenceString {
    pub field: PackageMatchField,
    pub value: String,
    pub additional: Option<String>,
}

impl SystemReferenceString {
    pub fn new(field: PackageMatchField, value: &str) -> Self {
        Self {
            field,
            value: fold_case(value),
            additional: None,
        }
    }

    /// Builds the normalized name and publisher pair.
    pub fn name_and_publisher(name: &str, publisher: &str) -> Self {
        Self {
            field: PackageMatchField::NormalizedNameAndPublisher,
            value: normalize_name(name),
            additional: Some(normalize_publisher(publisher)),
        }
    }

    pub fn is_strong(&self) -> bool {
        self.field.is_strong()
    }

    pub fn to_filter(&self) -> PackageMatchFilter {
        match &self.additional {
            Some(additional) => PackageMatchFilter::with_additional(
                self.field,
                MatchType::Exact,
                self.value.clone(),
                additional.clone(),
            ),
            None => PackageMatchFilter::new(self.field, MatchType::Exact, self.value.clone()),
        }
    }
}

pub fn fold_case(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Normalizes a display name: drops architecture markers and version tokens,
/// then keeps only case-folded alphanumerics.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    lowered
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | ',')))
        .filter(|word| !NAME_NOISE.contains(word) && !looks_like_version(word))
        .flat_map(|word| word.chars().filter(|c| c.is_alphanumeric()))
        .collect()
}

/// Normalizes a publisher: drops legal suffixes and keeps only case-folded alphanumerics.
pub fn normalize_publisher(publisher: &str) -> String {
    let lowered = publisher.to_lowercase();
    lowered
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty() && !PUBLISHER_NOISE.contains(word))
        .flat_map(|word| word.chars().filter(|c| c.is_alphanumeric()))
        .collect()
}

fn looks_like_version(word: &str) -> bool {
    let digits = word.strip_prefix('v').unwrap_or(word);
    digits.contains('.')
        && digits
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// All reference strings a single package version reports: family names,
/// product and upgrade codes, and every name × publisher pair.
pub fn for_version(version: &dyn PackageVersion) -> BTreeSet<SystemReferenceString> {
    let mut result = BTreeSet::new();

    for (property, field) in [
        (PackageVersionMultiProperty::PackageFamilyName, PackageMatchField::PackageFamilyName),
        (PackageVersionMultiProperty::ProductCode, PackageMatchField::ProductCode),
        (PackageVersionMultiProperty::UpgradeCode, PackageMatchField::UpgradeCode),
    ] {
        for value in version.multi_property(property) {
            if !value.trim().is_empty() {
                result.insert(SystemReferenceString::new(field, &value));
            }
        }
    }

    let mut names = version.multi_property(PackageVersionMultiProperty::Name);
    if names.is_empty() {
        names.push(version.property(PackageVersionProperty::Name));
    }
    let mut publishers = version.multi_property(PackageVersionMultiProperty::Publisher);
    if publishers.is_empty() {
        publishers.push(version.property(PackageVersionProperty::Publisher));
    }
    insert_name_publisher_pairs(&mut result, &names, &publishers);

    result
}

/// Union of the reference strings of every version of `package`.
pub fn for_package(package: &dyn Package) -> BTreeSet<SystemReferenceString> {
    package
        .version_keys()
        .iter()
        .filter_map(|key| package.version(key))
        .flat_map(|version| for_version(version.as_ref()))
        .collect()
}

/// Reference strings declared by a manifest.
pub fn for_manifest(manifest: &Manifest) -> BTreeSet<SystemReferenceString> {
    let mut result = BTreeSet::new();

    for pfn in manifest.package_family_names() {
        result.insert(SystemReferenceString::new(PackageMatchField::PackageFamilyName, &pfn));
    }
    for code in manifest.product_codes() {
        result.insert(SystemReferenceString::new(PackageMatchField::ProductCode, &code));
    }
    for code in manifest.upgrade_codes() {
        result.insert(SystemReferenceString::new(PackageMatchField::UpgradeCode, &code));
    }
    insert_name_publisher_pairs(&mut result, &manifest.names(), &manifest.publishers());

    result
}

fn insert_name_publisher_pairs(
    result: &mut BTreeSet<SystemReferenceString>,
    names: &[String],
    publishers: &[String],
) {
    let empty = [String::new()];
    let publishers = if publishers.is_empty() { &empty[..] } else { publishers };

    for name in names {
        for publisher in publishers {
            let reference = SystemReferenceString::name_and_publisher(name, publisher);
            if !reference.value.is_empty() {
                result.insert(reference);
            }
        }
    }
}

/// Builds an inclusion request with one exact filter per reference string.
pub fn inclusion_request<'a>(
    references: impl IntoIterator<Item = &'a SystemReferenceString>,
    purpose: SearchPurpose,
) -> SearchRequest {
    SearchRequest {
        inclusions: references.into_iter().map(SystemReferenceString::to_filter).collect(),
        purpose,
        ..Default::default()
    }
}
