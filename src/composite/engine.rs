//! Bidirectional correlation between the installed repository and the
//! available sources.
//!
//! A search runs in two passes. The installed pass starts from installed
//! packages and looks for their catalog entries; the available pass starts
//! from catalog results and looks for the installed packages they describe.
//! Both passes share one [`SearchContext`], which is then folded and
//! finalized into the caller-facing result.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::finalize::{CompositeSearchResult, finalize};
use super::fold::fold_matches;
use super::installed::CompositeInstalledPackage;
use super::package::CompositePackage;
use super::{CompositeSearchBehavior, CorrelationOptions};
use crate::package::reference::{self, SystemReferenceString};
use crate::package::{
    MatchType, Package, PackageMatchField, PackageMatchFilter, PackageProperty, ResultMatch,
    SearchFailure, SearchPurpose, SearchRequest, tracking_write_time,
};
use crate::source::{Source, SourceFeature};

/// A composite package and the criteria that brought it into the result.
pub(crate) struct WorkingMatch {
    pub package: CompositePackage,
    pub criteria: PackageMatchFilter,
}

/// Mutable state of one composite search.
#[derive(Default)]
pub(crate) struct SearchContext {
    pub matches: Vec<WorkingMatch>,
    pub failures: Vec<SearchFailure>,
    pub truncated: bool,
    failed_sources: HashSet<String>,
}

impl SearchContext {
    /// Records a source failure; only the first failure per source is kept.
    fn record_failure(&mut self, source: &dyn Source, error: anyhow::Error) {
        let identifier = source.identifier();
        let source_name = source.details().name;
        if !self.claim_failure(&[&identifier, &source_name]) {
            debug!("Suppressing another failure from {}: {:#}", identifier, error);
            return;
        }

        warn!("Search failed for source {}: {:#}", source_name, error);
        self.failures.push(SearchFailure { source_name, error });
    }

    /// Keeps the failures a source reported inside an otherwise successful search.
    fn absorb_failures(&mut self, failures: Vec<SearchFailure>) {
        for failure in failures {
            if !self.claim_failure(&[&failure.source_name]) {
                debug!(
                    "Suppressing another failure from {}: {:#}",
                    failure.source_name, failure.error
                );
                continue;
            }
            warn!("Source {} reported a failure: {:#}", failure.source_name, failure.error);
            self.failures.push(failure);
        }
    }

    fn absorb(&mut self, truncated: bool, failures: Vec<SearchFailure>) {
        self.truncated |= truncated;
        self.absorb_failures(failures);
    }

    /// False when any of `keys` already has a recorded failure.
    fn claim_failure(&mut self, keys: &[&str]) -> bool {
        if keys.iter().any(|key| self.failed_sources.contains(*key)) {
            return false;
        }
        self.failed_sources
            .extend(keys.iter().map(|key| key.to_string()));
        true
    }

    fn find_installed(&self, installed: &dyn Package) -> Option<usize> {
        self.matches.iter().position(|m| {
            m.package
                .installed()
                .is_some_and(|i| i.contains_underlying(installed))
        })
    }

    fn find_available(&self, available: &dyn Package) -> Option<usize> {
        self.matches
            .iter()
            .position(|m| m.package.contains_available(available))
    }
}

struct TrackingCandidate {
    package: Arc<dyn Package>,
    write_time: i64,
}

impl TrackingCandidate {
    fn new(package: Arc<dyn Package>) -> Self {
        let write_time = package
            .latest_version()
            .map_or(0, |v| tracking_write_time(&v.metadata()));
        Self {
            package,
            write_time,
        }
    }
}

/// The candidate with the latest write time; ties keep the first one seen.
fn latest_tracked(matches: Vec<ResultMatch>) -> Option<TrackingCandidate> {
    let mut best: Option<TrackingCandidate> = None;
    for m in matches {
        let candidate = TrackingCandidate::new(m.package);
        if best
            .as_ref()
            .is_none_or(|b| candidate.write_time > b.write_time)
        {
            best = Some(candidate);
        }
    }
    best
}

fn id_request(id: &str) -> SearchRequest {
    SearchRequest {
        filters: vec![PackageMatchFilter::new(
            PackageMatchField::Id,
            MatchType::CaseInsensitive,
            id,
        )],
        ..Default::default()
    }
}

/// A source that correlates the installed repository with available sources.
pub struct CompositeSource {
    identifier: String,
    installed: Option<Arc<dyn Source>>,
    available: Vec<Arc<dyn Source>>,
    options: CorrelationOptions,
}

impl CompositeSource {
    pub fn new(
        identifier: &str,
        installed: Option<Arc<dyn Source>>,
        available: Vec<Arc<dyn Source>>,
        options: CorrelationOptions,
    ) -> Self {
        Self {
            identifier: identifier.to_string(),
            installed,
            available,
            options,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn options(&self) -> &CorrelationOptions {
        &self.options
    }

    /// Runs `request` against every source and correlates the results.
    ///
    /// Errors from the installed repository are returned; errors from
    /// available sources are recorded in the result's failures.
    #[tracing::instrument(skip(self))]
    pub fn search(&self, request: &SearchRequest) -> Result<CompositeSearchResult> {
        let mut context = SearchContext::default();
        debug!("Composite search {} for {}", self.identifier, request);

        let Some(installed) = &self.installed else {
            self.search_available_only(request, &mut context);
            return Ok(finalize(context, request.maximum_results));
        };

        if self.options.behavior.includes_installed() {
            self.correlate_installed(installed.as_ref(), request, &mut context)?;

            if request.is_for_everything()
                && self.options.behavior == CompositeSearchBehavior::Installed
            {
                debug!("All installed packages requested; skipping available sources");
                return Ok(self.complete(context, request));
            }
        }

        self.correlate_available(installed.as_ref(), request, &mut context)?;
        Ok(self.complete(context, request))
    }

    fn complete(&self, mut context: SearchContext, request: &SearchRequest) -> CompositeSearchResult {
        fold_matches(&mut context.matches);
        finalize(context, request.maximum_results)
    }

    fn search_available_only(&self, request: &SearchRequest, context: &mut SearchContext) {
        for source in &self.available {
            match source.search(request) {
                Ok(result) => {
                    context.absorb(result.truncated, result.failures);
                    context
                        .matches
                        .extend(result.matches.into_iter().map(|m| WorkingMatch {
                            package: CompositePackage::with_available(m.package),
                            criteria: m.match_criteria,
                        }));
                }
                Err(error) => context.record_failure(source.as_ref(), error),
            }
        }
    }

    /// Installed pass: every installed match becomes an entry, and each
    /// available source is asked for the package it corresponds to.
    fn correlate_installed(
        &self,
        installed_source: &dyn Source,
        request: &SearchRequest,
        context: &mut SearchContext,
    ) -> Result<()> {
        let result = installed_source.search(request).with_context(|| {
            format!("Failed to search installed source {}", installed_source.identifier())
        })?;
        context.absorb(result.truncated, result.failures);

        let mut strong_owners: HashMap<SystemReferenceString, String> = HashMap::new();

        for installed_match in result.matches {
            let installed_id = installed_match.package.property(PackageProperty::Id);
            let Some(installed_version) = installed_match.package.latest_version() else {
                warn!("Installed package {} has no installed version; skipping", installed_id);
                continue;
            };

            let composite_installed = CompositeInstalledPackage::new(installed_match.package.clone());
            if composite_installed.is_empty() {
                warn!("Installed package {} produced no versions; skipping", installed_id);
                continue;
            }

            let references = reference::for_version(installed_version.as_ref());
            for strong in references.iter().filter(|r| r.is_strong()) {
                if let Some(previous) = strong_owners.insert(strong.clone(), installed_id.clone()) {
                    error!(
                        "Installed packages {} and {} both report {} {}",
                        previous, installed_id, strong.field, strong.value
                    );
                }
            }

            let mut package = CompositePackage::with_installed(composite_installed);

            if !references.is_empty() {
                let correlation_request =
                    reference::inclusion_request(&references, SearchPurpose::CorrelationToAvailable);

                for source in &self.available {
                    if let Err(error) = self.find_available_for_installed(
                        source.as_ref(),
                        &correlation_request,
                        &references,
                        &mut package,
                        context,
                    ) {
                        context.record_failure(source.as_ref(), error);
                    }
                }
            }

            context.matches.push(WorkingMatch {
                package,
                criteria: installed_match.match_criteria,
            });
        }

        Ok(())
    }

    fn find_available_for_installed(
        &self,
        source: &dyn Source,
        correlation_request: &SearchRequest,
        installed_references: &BTreeSet<SystemReferenceString>,
        package: &mut CompositePackage,
        context: &mut SearchContext,
    ) -> Result<()> {
        let mut tracking_updated = false;
        let mut tracking_id: Option<String> = None;

        if let Some(catalog) = source.tracking_catalog() {
            let tracked = catalog
                .search(correlation_request)
                .context("Failed to search tracking catalog")?;
            context.absorb_failures(tracked.failures);

            if let Some(candidate) = latest_tracked(tracked.matches) {
                tracking_id = Some(candidate.package.property(PackageProperty::Id));
                if candidate.write_time > package.tracking_write_time() {
                    debug!(
                        "Tracking {} in {} (written at {})",
                        candidate.package.property(PackageProperty::Id),
                        source.identifier(),
                        candidate.write_time
                    );
                    package.set_tracking(source.details(), candidate.package, candidate.write_time);
                    tracking_updated = true;
                }
            }
        }

        let mut live = Vec::new();
        if source.query_feature_flag(SourceFeature::InstalledCorrelationSearch) {
            let result = source.search(correlation_request)?;
            context.absorb_failures(result.failures);
            live = result.matches;
        }

        let resolved = match live.len() {
            0 => match &tracking_id {
                Some(id) => self.find_by_id(source, id, context)?,
                None => None,
            },
            1 => live.pop().map(|m| m.package),
            _ => resolve_by_strong_reference(live, installed_references, source),
        };

        if let Some(available) = resolved {
            debug!(
                "Correlated installed package with {} from {}",
                available.property(PackageProperty::Id),
                source.identifier()
            );
            package.add_available(available, tracking_updated);
        }

        Ok(())
    }

    /// Looks up a tracked identifier in the live source; exactly one hit is required.
    fn find_by_id(
        &self,
        source: &dyn Source,
        id: &str,
        context: &mut SearchContext,
    ) -> Result<Option<Arc<dyn Package>>> {
        let result = source.search(&id_request(id))?;
        context.absorb_failures(result.failures);
        let mut matches = result.matches;
        match matches.len() {
            1 => Ok(matches.pop().map(|m| m.package)),
            0 => {
                debug!("Tracked package {} is no longer in {}", id, source.identifier());
                Ok(None)
            }
            count => {
                info!(
                    "Found {} packages for tracked id {} in {}; not correlating",
                    count,
                    id,
                    source.identifier()
                );
                Ok(None)
            }
        }
    }

    /// Available pass: each catalog result is cross-searched in the installed
    /// repository and attached to the entry of every installed package it
    /// describes.
    fn correlate_available(
        &self,
        installed_source: &dyn Source,
        request: &SearchRequest,
        context: &mut SearchContext,
    ) -> Result<()> {
        for source in &self.available {
            let result = match source.search(request) {
                Ok(result) => result,
                Err(error) => {
                    context.record_failure(source.as_ref(), error);
                    continue;
                }
            };
            context.absorb(result.truncated, result.failures);

            let match_count = result.matches.len();
            for available_match in result.matches {
                self.correlate_available_match(
                    installed_source,
                    source.as_ref(),
                    available_match,
                    match_count,
                    context,
                )?;
            }
        }

        Ok(())
    }

    fn correlate_available_match(
        &self,
        installed_source: &dyn Source,
        source: &dyn Source,
        available_match: ResultMatch,
        match_count: usize,
        context: &mut SearchContext,
    ) -> Result<()> {
        let available = available_match.package;

        if let Some(index) = context.find_available(available.as_ref()) {
            let existing = &mut context.matches[index];
            if available_match.match_criteria.is_stronger_than(&existing.criteria) {
                existing.criteria = available_match.match_criteria;
            }
            return Ok(());
        }

        let mut references = reference::for_package(available.as_ref());

        if source.query_feature_flag(SourceFeature::ManifestMayContainAdditionalSystemReferenceStrings)
            && match_count <= self.options.manifest_parse_threshold
        {
            references.extend(self.manifest_references(available.as_ref()));
        }

        let mut tracking_candidate: Option<TrackingCandidate> = None;
        if let Some(catalog) = source.tracking_catalog() {
            match catalog.search(&id_request(&available.property(PackageProperty::Id))) {
                Ok(tracked) => {
                    context.absorb_failures(tracked.failures);
                    if let [m] = tracked.matches.as_slice() {
                        references.extend(reference::for_package(m.package.as_ref()));
                        tracking_candidate = Some(TrackingCandidate::new(m.package.clone()));
                    }
                }
                Err(error) => context.record_failure(
                    source,
                    error.context("Failed to search tracking catalog"),
                ),
            }
        }

        let mut correlated = false;

        if !references.is_empty() {
            let cross_request =
                reference::inclusion_request(&references, SearchPurpose::CorrelationToInstalled);
            let cross = installed_source.search(&cross_request).with_context(|| {
                format!("Failed to search installed source {}", installed_source.identifier())
            })?;
            context.absorb_failures(cross.failures);

            let any_strong = cross
                .matches
                .iter()
                .any(|m| m.match_criteria.field.is_strong());

            for installed_match in cross.matches {
                if !installed_match.match_criteria.field.is_strong() {
                    if any_strong {
                        debug!(
                            "Ignoring weak match on {} in favor of strong matches",
                            installed_match.package.property(PackageProperty::Id)
                        );
                        continue;
                    }
                    if !self.corroborate(source, available.as_ref(), installed_match.package.as_ref(), context) {
                        continue;
                    }
                }

                correlated |= self.attach(
                    source,
                    &available,
                    installed_match.package,
                    &available_match.match_criteria,
                    tracking_candidate.as_ref(),
                    context,
                );
            }
        }

        if !correlated && self.options.behavior.allows_available_only() {
            context.matches.push(WorkingMatch {
                package: CompositePackage::with_available(available),
                criteria: available_match.match_criteria,
            });
        }

        Ok(())
    }

    fn manifest_references(&self, available: &dyn Package) -> BTreeSet<SystemReferenceString> {
        let mut references = BTreeSet::new();
        for key in available
            .version_keys()
            .into_iter()
            .take(self.options.max_manifests_per_package)
        {
            let Some(version) = available.version(&key) else {
                continue;
            };
            match version.manifest() {
                Ok(manifest) => references.extend(reference::for_manifest(&manifest)),
                Err(e) => debug!("Skipping manifest of {}: {:#}", key.version, e),
            }
        }
        references
    }

    /// A weak match is only trusted when searching the available source with
    /// the installed package's own reference strings does not point elsewhere.
    fn corroborate(
        &self,
        source: &dyn Source,
        available: &dyn Package,
        installed: &dyn Package,
        context: &mut SearchContext,
    ) -> bool {
        let Some(installed_version) = installed.latest_version() else {
            return false;
        };
        let installed_references = reference::for_version(installed_version.as_ref());
        if installed_references.is_empty() {
            return false;
        }

        let request =
            reference::inclusion_request(&installed_references, SearchPurpose::CorrelationToAvailable);
        let result = match source.search(&request) {
            Ok(result) => result,
            Err(error) => {
                context.record_failure(source, error);
                return false;
            }
        };
        context.absorb_failures(result.failures);

        let installed_id = installed.property(PackageProperty::Id);
        match result.matches.as_slice() {
            // Accepted by policy: the association most likely comes from tracking history
            [] => {
                debug!(
                    "No live corroboration for {} in {}; trusting the association",
                    installed_id,
                    source.identifier()
                );
                true
            }
            [only] => {
                let same = only.package.is_same(available);
                if !same {
                    debug!(
                        "Weak match for {} points to {} instead",
                        installed_id,
                        only.package.property(PackageProperty::Id)
                    );
                }
                same
            }
            _ => {
                info!(
                    "Multiple packages in {} match {}; not correlating",
                    source.identifier(),
                    installed_id
                );
                false
            }
        }
    }

    /// Attaches `available` to the entry owning `installed`, creating the
    /// entry when needed. Returns whether the package was attached.
    fn attach(
        &self,
        source: &dyn Source,
        available: &Arc<dyn Package>,
        installed: Arc<dyn Package>,
        criteria: &PackageMatchFilter,
        tracking: Option<&TrackingCandidate>,
        context: &mut SearchContext,
    ) -> bool {
        let index = match context.find_installed(installed.as_ref()) {
            Some(index) => index,
            None => {
                let installed_id = installed.property(PackageProperty::Id);
                let composite = CompositeInstalledPackage::new(installed);
                if composite.is_empty() {
                    warn!("Installed package {} produced no versions; skipping", installed_id);
                    return false;
                }
                context.matches.push(WorkingMatch {
                    package: CompositePackage::with_installed(composite),
                    criteria: criteria.clone(),
                });
                context.matches.len() - 1
            }
        };

        let entry = &mut context.matches[index].package;
        let source_identifier = source.identifier();
        if entry.has_available_from_source(&source_identifier) {
            debug!(
                "Entry already has a package from {}; not adding {}",
                source_identifier,
                available.property(PackageProperty::Id)
            );
            return false;
        }

        let mut make_primary = false;
        if let Some(candidate) = tracking {
            if candidate.write_time > entry.tracking_write_time() {
                entry.set_tracking(source.details(), candidate.package.clone(), candidate.write_time);
                make_primary = true;
            }
        }

        entry.add_available(available.clone(), make_primary);
        true
    }
}

/// Among several live hits, keeps the single one sharing a strong reference
/// string with the installed package.
fn resolve_by_strong_reference(
    matches: Vec<ResultMatch>,
    installed_references: &BTreeSet<SystemReferenceString>,
    source: &dyn Source,
) -> Option<Arc<dyn Package>> {
    let mut corroborated: Vec<Arc<dyn Package>> = matches
        .into_iter()
        .map(|m| m.package)
        .filter(|p| {
            reference::for_package(p.as_ref())
                .iter()
                .any(|r| r.is_strong() && installed_references.contains(r))
        })
        .collect();

    if corroborated.len() == 1 {
        return corroborated.pop();
    }

    info!(
        "Found {} strongly matching packages in {} for one installed package; not correlating",
        corroborated.len(),
        source.identifier()
    );
    None
}
