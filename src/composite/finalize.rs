//! Ranking, truncation and the caller-facing composite result.

use std::sync::Arc;

use super::engine::{SearchContext, WorkingMatch};
use super::package::CompositePackage;
use crate::package::{PackageMatchFilter, SearchFailure};

pub struct CompositeResultMatch {
    pub package: Arc<CompositePackage>,
    /// The strongest criteria that brought the package into the result.
    pub match_criteria: PackageMatchFilter,
}

#[derive(Default)]
pub struct CompositeSearchResult {
    pub matches: Vec<CompositeResultMatch>,
    /// Set when any source truncated its results or the combined result was cut.
    pub truncated: bool,
    /// At most one failure per available source.
    pub failures: Vec<SearchFailure>,
}

/// Orders matches by criteria strength (stable for equal criteria) and
/// applies `maximum_results` when non-zero.
pub(crate) fn finalize(context: SearchContext, maximum_results: usize) -> CompositeSearchResult {
    let mut matches: Vec<WorkingMatch> = context.matches;
    let mut truncated = context.truncated;

    matches.sort_by(|a, b| a.criteria.strength_order(&b.criteria));

    if maximum_results > 0 && matches.len() > maximum_results {
        matches.truncate(maximum_results);
        truncated = true;
    }

    CompositeSearchResult {
        matches: matches
            .into_iter()
            .map(|m| CompositeResultMatch {
                package: Arc::new(m.package),
                match_criteria: m.criteria,
            })
            .collect(),
        truncated,
        failures: context.failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{MatchType, Package, PackageMatchField, PackageProperty};
    use crate::source::{PackageData, VersionData};
    use crate::test_utils::memory_package;

    fn working(id: &str, criteria: PackageMatchFilter) -> WorkingMatch {
        WorkingMatch {
            package: CompositePackage::with_available(memory_package(
                "store",
                PackageData::new(id, id).with_version(VersionData::new("1.0")),
            )),
            criteria,
        }
    }

    fn ids(result: &CompositeSearchResult) -> Vec<String> {
        result
            .matches
            .iter()
            .map(|m| m.package.available()[0].property(PackageProperty::Id))
            .collect()
    }

    fn context(matches: Vec<WorkingMatch>) -> SearchContext {
        let mut context = SearchContext::default();
        context.matches = matches;
        context
    }

    #[test]
    fn test_ranks_by_criteria_and_keeps_order_for_ties() {
        let name = PackageMatchFilter::new(PackageMatchField::Name, MatchType::Substring, "t");
        let id_exact = PackageMatchFilter::new(PackageMatchField::Id, MatchType::Exact, "t");
        let result = finalize(
            context(vec![
                working("first", name.clone()),
                working("second", PackageMatchFilter::wildcard()),
                working("third", id_exact),
                working("fourth", name),
            ]),
            0,
        );

        assert_eq!(ids(&result), vec!["third", "first", "fourth", "second"]);
        assert!(!result.truncated);
    }

    #[test]
    fn test_truncates_to_maximum_results() {
        let matches = (0..4)
            .map(|i| working(&format!("p{}", i), PackageMatchFilter::wildcard()))
            .collect();
        let result = finalize(context(matches), 3);

        assert_eq!(ids(&result), vec!["p0", "p1", "p2"]);
        assert!(result.truncated);
    }

    #[test]
    fn test_source_truncation_is_preserved() {
        let mut ctx = context(vec![working("only", PackageMatchFilter::wildcard())]);
        ctx.truncated = true;
        let result = finalize(ctx, 10);

        assert_eq!(result.matches.len(), 1);
        assert!(result.truncated);
    }
}
