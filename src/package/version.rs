//! Version parsing and comparison.
//!
//! Versions reported by installers and catalogs rarely follow semver, so this
//! module parses them loosely: a dotted list of parts, each a leading integer
//! followed by an optional free-form suffix.

use std::cmp::Ordering;
use std::fmt;

const LATEST: &str = "latest";
const UNKNOWN: &str = "unknown";
const APPROXIMATE_LESS_THAN: &str = "< ";
const APPROXIMATE_GREATER_THAN: &str = "> ";

/// Relation of an approximate version to its base version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApproximateComparator {
    #[default]
    None,
    LessThan,
    GreaterThan,
}

/// A single dot-separated part of a version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Part {
    pub integer: u64,
    pub other: String,
    folded_other: String,
}

impl Part {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let digits_end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());

        let (integer, other) = if digits_end == 0 {
            (0, trimmed.to_string())
        } else {
            match trimmed[..digits_end].parse::<u64>() {
                Ok(value) => (value, trimmed[digits_end..].to_string()),
                // Overflow keeps the whole part as text
                Err(_) => (0, trimmed.to_string()),
            }
        };

        Self::new(integer, other)
    }

    fn new(integer: u64, other: String) -> Self {
        let other = other.trim().to_string();
        let folded_other = other.to_lowercase();
        Self {
            integer,
            other,
            folded_other,
        }
    }

    fn is_empty(&self) -> bool {
        self.integer == 0 && self.other.is_empty()
    }
}

impl Ord for Part {
    fn cmp(&self, other: &Self) -> Ordering {
        self.integer.cmp(&other.integer).then_with(|| {
            match (self.other.is_empty(), other.other.is_empty()) {
                (true, true) => Ordering::Equal,
                // A bare number is newer than the same number with a suffix ("1" > "1-beta")
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.folded_other.cmp(&other.folded_other),
            }
        })
    }
}

impl PartialOrd for Part {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A comparable version parsed from a free-form string.
#[derive(Debug, Clone, Default)]
pub struct Version {
    raw: String,
    parts: Vec<Part>,
    approximate: ApproximateComparator,
}

impl Version {
    /// Parse a version string.
    ///
    /// Never fails: strings that do not look like versions simply produce
    /// parts with textual suffixes, which still compare deterministically.
    pub fn new(version: &str) -> Self {
        let raw = version.trim().to_string();

        let (approximate, base) = if let Some(rest) = strip_prefix_ci(&raw, APPROXIMATE_LESS_THAN) {
            (ApproximateComparator::LessThan, rest)
        } else if let Some(rest) = strip_prefix_ci(&raw, APPROXIMATE_GREATER_THAN) {
            (ApproximateComparator::GreaterThan, rest)
        } else {
            (ApproximateComparator::None, raw.as_str())
        };

        // Drop a leading non-numeric prefix such as "v" when a digit shows up before the first dot
        let digit_pos = base.find(|c: char| c.is_ascii_digit());
        let split_pos = base.find('.');
        let base = match (digit_pos, split_pos) {
            (Some(d), Some(s)) if d < s => &base[d..],
            (Some(d), None) => &base[d..],
            _ => base,
        };

        let mut parts: Vec<Part> = if base.is_empty() {
            Vec::new()
        } else {
            base.split('.').map(Part::parse).collect()
        };

        while parts.last().is_some_and(Part::is_empty) {
            parts.pop();
        }

        let mut version = Self {
            raw: raw.clone(),
            parts,
            approximate,
        };

        if version.approximate != ApproximateComparator::None && version.is_unknown() {
            // An approximation of nothing is just unknown
            version.approximate = ApproximateComparator::None;
        }

        version
    }

    /// Build an approximate version ("< 1.0" or "> 1.0") around `base`.
    pub fn approximate(base: &Version, comparator: ApproximateComparator) -> anyhow::Result<Self> {
        if comparator == ApproximateComparator::None {
            return Ok(base.clone());
        }
        if base.is_approximate() || base.is_unknown() {
            anyhow::bail!("Cannot build an approximate version from {:?}", base.raw);
        }

        let prefix = match comparator {
            ApproximateComparator::LessThan => APPROXIMATE_LESS_THAN,
            _ => APPROXIMATE_GREATER_THAN,
        };

        Ok(Self {
            raw: format!("{}{}", prefix, base.raw),
            parts: base.parts.clone(),
            approximate: comparator,
        })
    }

    /// The sentinel version used for entries whose version is not known.
    pub fn unknown() -> Self {
        Self::new("Unknown")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn is_approximate(&self) -> bool {
        self.approximate != ApproximateComparator::None
    }

    pub fn approximate_comparator(&self) -> ApproximateComparator {
        self.approximate
    }

    pub fn is_latest(&self) -> bool {
        self.approximate != ApproximateComparator::LessThan && self.is_base_sentinel(LATEST)
    }

    pub fn is_unknown(&self) -> bool {
        self.is_base_sentinel(UNKNOWN)
    }

    fn is_base_sentinel(&self, name: &str) -> bool {
        self.parts.len() == 1 && self.parts[0].integer == 0 && self.parts[0].folded_other == name
    }

    fn approximate_rank(&self) -> u8 {
        match self.approximate {
            ApproximateComparator::LessThan => 0,
            ApproximateComparator::None => 1,
            ApproximateComparator::GreaterThan => 2,
        }
    }
}

fn strip_prefix_ci<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() >= prefix.len() && value.is_char_boundary(prefix.len()) {
        let (head, tail) = value.split_at(prefix.len());
        if head.eq_ignore_ascii_case(prefix) {
            return Some(tail);
        }
    }
    None
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let self_latest = self.is_base_sentinel(LATEST);
        let other_latest = other.is_base_sentinel(LATEST);
        if self_latest || other_latest {
            return self_latest
                .cmp(&other_latest)
                .then_with(|| self.approximate_rank().cmp(&other.approximate_rank()));
        }

        let self_unknown = self.is_unknown();
        let other_unknown = other.is_unknown();
        if self_unknown || other_unknown {
            return other_unknown.cmp(&self_unknown);
        }

        let empty = Part::default();
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).unwrap_or(&empty);
            let b = other.parts.get(i).unwrap_or(&empty);
            match a.cmp(b) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }

        self.approximate_rank().cmp(&other.approximate_rank())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Inclusive range of versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub min: Version,
    pub max: Version,
}

impl VersionRange {
    pub fn new(min: Version, max: Version) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, version: &Version) -> bool {
        &self.min <= version && version <= &self.max
    }

    /// Whether the range collapses onto exactly `version`.
    pub fn is_same_as_single_version(&self, version: &Version) -> bool {
        &self.min == version && &self.max == version
    }
}

/// Release channel of a version. Empty for the default channel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Channel(String);

impl Channel {
    pub fn new(channel: &str) -> Self {
        Self(channel.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A version paired with its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionAndChannel {
    pub version: Version,
    pub channel: Channel,
}

impl VersionAndChannel {
    pub fn new(version: &str, channel: &str) -> Self {
        Self {
            version: Version::new(version),
            channel: Channel::new(channel),
        }
    }

    /// Ordering used for version listings: channel ascending, then highest version first.
    pub fn listing_order(&self, other: &Self) -> Ordering {
        self.channel
            .cmp(&other.channel)
            .then_with(|| other.version.cmp(&self.version))
    }

    /// Whether `other` is a newer version on the same channel.
    pub fn is_updated_by(&self, other: &Self) -> bool {
        self.channel.as_str().eq_ignore_ascii_case(other.channel.as_str()) && self.version < other.version
    }
}

impl fmt::Display for VersionAndChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.channel.as_str().is_empty() {
            write!(f, "{}", self.version)
        } else {
            write!(f, "{}[{}]", self.version, self.channel.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_prefix_and_trailing_zeros() {
        let v = Version::new("v1.2.0.0");
        assert_eq!(v.parts().len(), 2);
        assert_eq!(v.parts()[0].integer, 1);
        assert_eq!(v.parts()[1].integer, 2);
        assert_eq!(v.as_str(), "v1.2.0.0");
    }

    #[test]
    fn test_compare_numeric_parts() {
        assert!(Version::new("1.10") > Version::new("1.9"));
        assert!(Version::new("2.0") > Version::new("1.99.99"));
        assert_eq!(Version::new("1.0"), Version::new("1.0.0.0"));
    }

    #[test]
    fn test_compare_suffix_is_lower() {
        assert!(Version::new("1.0-beta") < Version::new("1.0"));
        assert!(Version::new("1.0-alpha") < Version::new("1.0-BETA"));
    }

    #[test]
    fn test_latest_and_unknown_sentinels() {
        assert!(Version::new("Latest") > Version::new("999.0"));
        assert!(Version::unknown() < Version::new("0.0.1"));
        assert!(Version::new("unknown").is_unknown());
        assert!(!Version::new("1.0").is_unknown());
    }

    #[test]
    fn test_approximate_ordering() {
        let base = Version::new("2.0");
        let less = Version::approximate(&base, ApproximateComparator::LessThan).unwrap();
        let greater = Version::approximate(&base, ApproximateComparator::GreaterThan).unwrap();

        assert_eq!(less.as_str(), "< 2.0");
        assert_eq!(greater.as_str(), "> 2.0");
        assert!(less < base);
        assert!(base < greater);
        assert!(greater < Version::new("2.0.1"));
        assert!(less > Version::new("1.9"));
    }

    #[test]
    fn test_approximate_round_trips_through_parse() {
        let parsed = Version::new("> 2.0");
        assert!(parsed.is_approximate());
        assert_eq!(parsed.approximate_comparator(), ApproximateComparator::GreaterThan);
        assert_eq!(parsed.parts()[0].integer, 2);
    }

    #[test]
    fn test_approximate_rejects_unknown_and_nested() {
        assert!(Version::approximate(&Version::unknown(), ApproximateComparator::LessThan).is_err());
        let approx = Version::new("< 1.0");
        assert!(Version::approximate(&approx, ApproximateComparator::GreaterThan).is_err());
    }

    #[test]
    fn test_overflowing_part_kept_as_text() {
        let v = Version::new("1.99999999999999999999999");
        assert_eq!(v.parts()[1].integer, 0);
        assert_eq!(v.parts()[1].other, "99999999999999999999999");
    }

    #[test]
    fn test_range_contains() {
        let range = VersionRange::new(Version::new("1.0.0.0"), Version::new("1.0.9.9"));
        assert!(range.contains(&Version::new("1.0.5.0")));
        assert!(range.contains(&Version::new("1.0")));
        assert!(!range.contains(&Version::new("1.1")));
        assert!(!range.is_same_as_single_version(&Version::new("1.0")));

        let single = VersionRange::new(Version::new("3.0"), Version::new("3.0.0"));
        assert!(single.is_same_as_single_version(&Version::new("3.0")));
    }

    #[test]
    fn test_listing_order_highest_first_per_channel() {
        let mut versions = vec![
            VersionAndChannel::new("1.0", ""),
            VersionAndChannel::new("2.0", "beta"),
            VersionAndChannel::new("3.0", ""),
        ];
        versions.sort_by(|a, b| a.listing_order(b));

        let rendered: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["3.0", "1.0", "2.0[beta]"]);
    }

    #[test]
    fn test_is_updated_by_requires_same_channel() {
        let installed = VersionAndChannel::new("1.0", "");
        assert!(installed.is_updated_by(&VersionAndChannel::new("1.1", "")));
        assert!(!installed.is_updated_by(&VersionAndChannel::new("1.1", "beta")));
        assert!(!installed.is_updated_by(&VersionAndChannel::new("0.9", "")));
    }
}
