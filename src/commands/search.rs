use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::composite::{
    CompositePackage, CompositeSearchBehavior, CompositeSearchResult, CorrelationOptions,
};
use crate::package::{MatchType, Package, PackageProperty, PackageVersionProperty, SearchRequest};
use crate::runtime::Runtime;
use crate::source::CatalogFile;

use super::paths::catalog_path;

const MISSING: &str = "-";

/// Options shared by the search commands.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub catalog: Option<PathBuf>,
    pub behavior: CompositeSearchBehavior,
    /// 0 means unlimited.
    pub max_results: usize,
    pub exact: bool,
}

/// Search the catalog and print one row per correlated package
#[tracing::instrument(skip(runtime, options))]
pub fn search<R: Runtime>(runtime: R, query: Option<&str>, options: &SearchOptions) -> Result<()> {
    let request = build_request(query, options);
    let result = run(&runtime, &request, options, options.behavior)?;
    print_result(&result, false)
}

/// List installed packages, marking the ones with an update available
#[tracing::instrument(skip(runtime, options))]
pub fn list<R: Runtime>(runtime: R, options: &SearchOptions) -> Result<()> {
    let request = SearchRequest {
        maximum_results: options.max_results,
        ..Default::default()
    };
    let result = run(&runtime, &request, options, CompositeSearchBehavior::Installed)?;
    print_result(&result, true)
}

fn build_request(query: Option<&str>, options: &SearchOptions) -> SearchRequest {
    let mut request = match query {
        Some(query) => {
            let match_type = if options.exact {
                MatchType::Exact
            } else {
                MatchType::Substring
            };
            SearchRequest::with_query(match_type, query)
        }
        None => SearchRequest::everything(),
    };
    request.maximum_results = options.max_results;
    request
}

pub(crate) fn run<R: Runtime>(
    runtime: &R,
    request: &SearchRequest,
    options: &SearchOptions,
    behavior: CompositeSearchBehavior,
) -> Result<CompositeSearchResult> {
    let path = catalog_path(runtime, options.catalog.clone())?;
    let catalog = CatalogFile::load(runtime, &path)?;
    let composite = catalog.into_composite(CorrelationOptions::with_behavior(behavior))?;

    debug!(
        "Running {} search on {} for {}",
        composite.options().behavior,
        composite.identifier(),
        request
    );
    composite.search(request)
}

fn print_result(result: &CompositeSearchResult, mark_updates: bool) -> Result<()> {
    for failure in &result.failures {
        eprintln!(
            "Warning: Source {} failed: {:#}",
            failure.source_name, failure.error
        );
    }

    if result.matches.is_empty() {
        println!("No packages found.");
        return Ok(());
    }

    for line in render(result, mark_updates)? {
        println!("{}", line);
    }

    if result.truncated {
        println!("Results were truncated; narrow the query or raise --max-results.");
    }
    Ok(())
}

/// Renders a header and one row per match.
pub(crate) fn render(result: &CompositeSearchResult, mark_updates: bool) -> Result<Vec<String>> {
    let mut rows = vec![[
        "Name".to_string(),
        "Id".to_string(),
        "Version".to_string(),
        "Available".to_string(),
        "Source".to_string(),
    ]];
    for m in &result.matches {
        rows.push(row(&m.package, mark_updates)?);
    }

    let widths: Vec<usize> = (0..4)
        .map(|column| rows.iter().map(|r| r[column].len()).max().unwrap_or(0))
        .collect();

    Ok(rows
        .iter()
        .map(|r| {
            format!(
                "{:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}  {}",
                r[0],
                r[1],
                r[2],
                r[3],
                r[4],
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
                w3 = widths[3],
            )
            .trim_end()
            .to_string()
        })
        .collect())
}

fn row(package: &CompositePackage, mark_updates: bool) -> Result<[String; 5]> {
    let installed = package
        .installed_version()
        .map(|v| v.property(PackageVersionProperty::Version))
        .unwrap_or_else(|| MISSING.to_string());

    let mut available = package
        .latest_available_version()
        .map(|v| v.property(PackageVersionProperty::Version))
        .unwrap_or_else(|| MISSING.to_string());
    if mark_updates && package.is_update_available() {
        available.push_str(" (update)");
    }

    let source = package
        .primary_available()
        .or(package.available().first())
        .map(|p| p.source().name)
        .or_else(|| package.installed().map(|i| i.source().name))
        .unwrap_or_default();

    Ok([
        package.property(PackageProperty::Name)?,
        package.property(PackageProperty::Id)?,
        installed,
        available,
        source,
    ])
}
