//! The subset of a package manifest that matters for correlation.

use serde::{Deserialize, Serialize};

use super::model::InstallerType;

/// An entry the installer writes to the system's installed programs list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppsAndFeaturesEntry {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub display_version: Option<String>,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub upgrade_code: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInstaller {
    #[serde(default)]
    pub installer_type: InstallerType,
    #[serde(default)]
    pub package_family_name: Option<String>,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apps_and_features_entries: Vec<AppsAndFeaturesEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub default_name: String,
    #[serde(default)]
    pub default_publisher: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installers: Vec<ManifestInstaller>,
}

impl Manifest {
    pub fn package_family_names(&self) -> Vec<String> {
        collect_unique(
            self.installers
                .iter()
                .filter_map(|i| i.package_family_name.clone()),
        )
    }

    pub fn product_codes(&self) -> Vec<String> {
        collect_unique(self.installers.iter().flat_map(|i| {
            i.product_code.clone().into_iter().chain(
                i.apps_and_features_entries
                    .iter()
                    .filter_map(|e| e.product_code.clone()),
            )
        }))
    }

    pub fn upgrade_codes(&self) -> Vec<String> {
        collect_unique(self.installers.iter().flat_map(|i| {
            i.apps_and_features_entries
                .iter()
                .filter_map(|e| e.upgrade_code.clone())
        }))
    }

    /// Display names: the default name plus any apps-and-features overrides.
    pub fn names(&self) -> Vec<String> {
        collect_unique(
            std::iter::once(self.default_name.clone()).chain(self.installers.iter().flat_map(|i| {
                i.apps_and_features_entries
                    .iter()
                    .filter_map(|e| e.display_name.clone())
            })),
        )
    }

    pub fn publishers(&self) -> Vec<String> {
        collect_unique(
            std::iter::once(self.default_publisher.clone()).chain(self.installers.iter().flat_map(
                |i| {
                    i.apps_and_features_entries
                        .iter()
                        .filter_map(|e| e.publisher.clone())
                },
            )),
        )
    }
}

fn collect_unique(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for value in values {
        if !value.is_empty() && !result.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            result.push(value);
        }
    }
    result
}
