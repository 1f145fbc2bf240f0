//! Merges result entries that turned out to describe the same installed
//! package, keyed by the available packages they were correlated with.

use log::debug;
use std::collections::HashMap;

use super::engine::WorkingMatch;
use crate::package::{Package, PackageProperty};

/// `(source identifier, folded package id)`
type AvailableKey = (String, String);

fn available_key(package: &dyn Package) -> AvailableKey {
    (
        package.source().identifier,
        package.property(PackageProperty::Id).to_lowercase(),
    )
}

/// Folds entries in place. Running it again on its own output changes nothing.
///
/// Entries sharing a primary available package collapse onto the first of
/// them. An entry without a primary joins the representative of one of its
/// available packages, preferring the most recently tracked one; failing
/// that, it absorbs later entries with exactly the same available packages.
pub(crate) fn fold_matches(matches: &mut Vec<WorkingMatch>) {
    let mut folded = vec![false; matches.len()];
    let mut representatives: HashMap<AvailableKey, usize> = HashMap::new();
    let mut secondary: HashMap<AvailableKey, Vec<usize>> = HashMap::new();

    for index in 0..matches.len() {
        let package = &matches[index].package;
        if package.available().is_empty() {
            continue;
        }

        match package.primary_available() {
            Some(primary) => {
                let key = available_key(primary.as_ref());
                match representatives.get(&key) {
                    Some(&target) => {
                        fold_into(matches, target, index);
                        folded[index] = true;
                    }
                    None => {
                        representatives.insert(key, index);
                    }
                }
            }
            None => {
                for available in package.available() {
                    secondary
                        .entry(available_key(available.as_ref()))
                        .or_default()
                        .push(index);
                }
            }
        }
    }

    for index in 0..matches.len() {
        let package = &matches[index].package;
        if folded[index] || package.available().is_empty() || package.primary_available().is_some() {
            continue;
        }

        let keys: Vec<AvailableKey> = package
            .available()
            .iter()
            .map(|a| available_key(a.as_ref()))
            .collect();

        let mut target: Option<usize> = None;
        for key in &keys {
            let Some(&candidate) = representatives.get(key) else {
                continue;
            };
            let newer = target.is_none_or(|t| {
                matches[candidate].package.tracking_write_time() > matches[t].package.tracking_write_time()
            });
            if newer {
                target = Some(candidate);
            }
        }

        if let Some(target) = target {
            fold_into(matches, target, index);
            folded[index] = true;
            continue;
        }

        let mut peers: Vec<usize> = keys
            .iter()
            .filter_map(|key| secondary.get(key))
            .flatten()
            .copied()
            .filter(|&other| other != index && !folded[other])
            .filter(|&other| {
                let available = matches[other].package.available();
                available.len() == keys.len()
                    && available.iter().all(|a| keys.contains(&available_key(a.as_ref())))
            })
            .collect();
        peers.sort_unstable();
        peers.dedup();

        for other in peers {
            fold_into(matches, index, other);
            folded[other] = true;
        }
    }

    let before = matches.len();
    let mut index = 0;
    matches.retain(|_| {
        let keep = !folded[index];
        index += 1;
        keep
    });

    if matches.len() != before {
        debug!("Folded {} result entries into {}", before, matches.len());
    }
}

fn fold_into(matches: &mut [WorkingMatch], target: usize, source: usize) {
    let package = std::mem::take(&mut matches[source].package);
    let criteria = matches[source].criteria.clone();

    let entry = &mut matches[target];
    entry.package.fold_in(package);
    if criteria.is_stronger_than(&entry.criteria) {
        entry.criteria = criteria;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::{CompositeInstalledPackage, CompositePackage};
    use crate::package::{MatchType, PackageMatchField, PackageMatchFilter, SourceDetails};
    use crate::source::{PackageData, VersionData};
    use crate::test_utils::memory_package;
    use std::sync::Arc;

    fn installed(id: &str) -> CompositeInstalledPackage {
        CompositeInstalledPackage::new(memory_package(
            "installed",
            PackageData::new(id, id).with_version(VersionData::new("1.0")),
        ))
    }

    fn available(source: &str, id: &str) -> Arc<dyn Package> {
        memory_package(source, PackageData::new(id, id).with_version(VersionData::new("1.0")))
    }

    fn entry(installed_id: &str, available_ids: &[(&str, &str)]) -> WorkingMatch {
        let mut package = CompositePackage::with_installed(installed(installed_id));
        for (source, id) in available_ids {
            package.add_available(available(source, id), false);
        }
        WorkingMatch {
            package,
            criteria: PackageMatchFilter::wildcard(),
        }
    }

    fn tracked_entry(installed_id: &str, source: &str, id: &str, write_time: i64) -> WorkingMatch {
        let mut package = CompositePackage::with_installed(installed(installed_id));
        package.set_tracking(SourceDetails::new(source, source), available(source, id), write_time);
        package.add_available(available(source, id), true);
        WorkingMatch {
            package,
            criteria: PackageMatchFilter::wildcard(),
        }
    }

    fn underlying_ids(matches: &[WorkingMatch]) -> Vec<Vec<String>> {
        matches
            .iter()
            .map(|m| {
                m.package
                    .installed()
                    .map(|i| {
                        i.underlying()
                            .iter()
                            .map(|u| u.property(PackageProperty::Id))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn test_shared_primary_folds_onto_first() {
        let mut matches = vec![
            tracked_entry("A", "store", "Tool", 5),
            entry("Other", &[]),
            tracked_entry("B", "store", "tool", 9),
        ];
        fold_matches(&mut matches);

        assert_eq!(underlying_ids(&matches), vec![vec!["A", "B"], vec!["Other"]]);
        assert_eq!(matches[0].package.tracking_write_time(), 9);
    }

    #[test]
    fn test_secondary_joins_most_recently_tracked_representative() {
        let mut matches = vec![
            tracked_entry("A", "one", "Tool", 5),
            tracked_entry("B", "two", "Tool", 7),
            entry("C", &[("one", "Tool"), ("two", "Tool")]),
        ];
        fold_matches(&mut matches);

        assert_eq!(underlying_ids(&matches), vec![vec!["A"], vec!["B", "C"]]);
    }

    #[test]
    fn test_secondaries_with_same_available_set_fold_together() {
        let mut matches = vec![
            entry("A", &[("store", "Tool")]),
            entry("B", &[("store", "Tool")]),
            entry("C", &[("store", "Tool"), ("other", "Tool")]),
            entry("D", &[("store", "Other")]),
        ];
        fold_matches(&mut matches);

        assert_eq!(
            underlying_ids(&matches),
            vec![vec!["A", "B"], vec!["C"], vec!["D"]]
        );
    }

    #[test]
    fn test_folding_keeps_stronger_criteria() {
        let mut second = entry("B", &[("store", "Tool")]);
        second.criteria = PackageMatchFilter::new(PackageMatchField::Id, MatchType::Exact, "tool");
        let mut matches = vec![entry("A", &[("store", "Tool")]), second];
        fold_matches(&mut matches);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].criteria.match_type, MatchType::Exact);
    }

    #[test]
    fn test_fold_is_idempotent() {
        let mut matches = vec![
            tracked_entry("A", "store", "Tool", 5),
            entry("B", &[("store", "Tool")]),
            tracked_entry("C", "store", "Tool", 3),
            entry("D", &[("store", "Editor")]),
            entry("E", &[("store", "Editor")]),
            entry("F", &[]),
        ];
        fold_matches(&mut matches);
        let once = underlying_ids(&matches);
        assert_eq!(once, vec![vec!["A", "C", "B"], vec!["D", "E"], vec!["F"]]);

        fold_matches(&mut matches);
        assert_eq!(underlying_ids(&matches), once);
    }
}
