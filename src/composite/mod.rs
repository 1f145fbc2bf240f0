//! Composite search across the installed repository and available sources.
//!
//! # Structure
//!
//! - `arp` - Maps installer-reported versions onto catalog versions
//! - `installed` - Merged view over installed package handles
//! - `package` - An installed side paired with its available packages
//! - `engine` - Bidirectional correlation between installed and available
//! - `fold` - Merges entries that turned out to be the same installed package
//! - `finalize` - Ranking, truncation and the caller-facing result

mod arp;
mod engine;
mod finalize;
mod fold;
mod installed;
mod package;

use std::fmt;
use std::str::FromStr;

pub use arp::map_installed_version;
pub use engine::CompositeSource;
pub use finalize::{CompositeResultMatch, CompositeSearchResult};
pub use installed::{CompositeInstalledPackage, CompositeInstalledVersion};
pub use package::CompositePackage;

/// Which packages a composite search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeSearchBehavior {
    /// Only packages that are installed.
    Installed,
    /// Packages from the available sources, with installed state attached where found.
    AvailablePackages,
    /// Everything: installed packages and uncorrelated available packages.
    #[default]
    AllPackages,
}

impl CompositeSearchBehavior {
    pub fn includes_installed(self) -> bool {
        matches!(
            self,
            CompositeSearchBehavior::Installed | CompositeSearchBehavior::AllPackages
        )
    }

    pub fn allows_available_only(self) -> bool {
        matches!(
            self,
            CompositeSearchBehavior::AvailablePackages | CompositeSearchBehavior::AllPackages
        )
    }
}

impl fmt::Display for CompositeSearchBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeSearchBehavior::Installed => write!(f, "installed"),
            CompositeSearchBehavior::AvailablePackages => write!(f, "available"),
            CompositeSearchBehavior::AllPackages => write!(f, "all"),
        }
    }
}

impl FromStr for CompositeSearchBehavior {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "installed" => Ok(CompositeSearchBehavior::Installed),
            "available" | "available-packages" => Ok(CompositeSearchBehavior::AvailablePackages),
            "all" | "all-packages" => Ok(CompositeSearchBehavior::AllPackages),
            _ => anyhow::bail!(
                "Unknown search behavior: {}. Expected installed, available, or all.",
                s
            ),
        }
    }
}

/// Tuning for a composite search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationOptions {
    pub behavior: CompositeSearchBehavior,
    /// Manifests are only parsed for extra reference strings when a source
    /// returned at most this many matches.
    pub manifest_parse_threshold: usize,
    /// Upper bound on manifests parsed per available package.
    pub max_manifests_per_package: usize,
}

impl Default for CorrelationOptions {
    fn default() -> Self {
        Self {
            behavior: CompositeSearchBehavior::default(),
            manifest_parse_threshold: 20,
            max_manifests_per_package: 3,
        }
    }
}

impl CorrelationOptions {
    pub fn with_behavior(behavior: CompositeSearchBehavior) -> Self {
        Self {
            behavior,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_parse() {
        assert_eq!(
            "installed".parse::<CompositeSearchBehavior>().unwrap(),
            CompositeSearchBehavior::Installed
        );
        assert_eq!(
            "Available".parse::<CompositeSearchBehavior>().unwrap(),
            CompositeSearchBehavior::AvailablePackages
        );
        assert_eq!(
            "all".parse::<CompositeSearchBehavior>().unwrap(),
            CompositeSearchBehavior::AllPackages
        );
        assert!("some".parse::<CompositeSearchBehavior>().is_err());
    }

    #[test]
    fn test_behavior_flags() {
        assert!(CompositeSearchBehavior::Installed.includes_installed());
        assert!(!CompositeSearchBehavior::Installed.allows_available_only());
        assert!(!CompositeSearchBehavior::AvailablePackages.includes_installed());
        assert!(CompositeSearchBehavior::AvailablePackages.allows_available_only());
        assert!(CompositeSearchBehavior::AllPackages.includes_installed());
        assert!(CompositeSearchBehavior::AllPackages.allows_available_only());
    }

    #[test]
    fn test_default_options() {
        let options = CorrelationOptions::default();
        assert_eq!(options.behavior, CompositeSearchBehavior::AllPackages);
        assert_eq!(options.max_manifests_per_package, 3);
        assert_eq!(
            CorrelationOptions::with_behavior(CompositeSearchBehavior::Installed).behavior,
            CompositeSearchBehavior::Installed
        );
    }
}
