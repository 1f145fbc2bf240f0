use anyhow::Result;
use clap::Parser;
use pkgcorr::commands::{self, SearchOptions};
use pkgcorr::composite::CompositeSearchBehavior;
use std::path::PathBuf;

/// pkgcorr - correlate installed packages with package catalogs
///
/// Reads a catalog file describing the installed repository and the
/// available sources, then matches installed packages to catalog entries.
///
/// Examples:
///   pkgcorr search contoso     # Search installed and available packages
///   pkgcorr list               # Installed packages, with updates marked
#[derive(Parser, Debug)]
#[command(author, version = env!("PKGCORR_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Catalog file (defaults to <config dir>/pkgcorr/catalog.json; also via PKGCORR_CATALOG)
    #[arg(long, env = "PKGCORR_CATALOG", value_name = "PATH", global = true)]
    pub catalog: Option<PathBuf>,

    /// Which packages to return: installed, available or all
    #[arg(long, value_name = "BEHAVIOR", default_value = "all", global = true)]
    pub behavior: CompositeSearchBehavior,

    /// Maximum number of results; 0 means unlimited
    #[arg(long = "max-results", value_name = "N", default_value_t = 0, global = true)]
    pub max_results: usize,

    /// Match the query exactly instead of as a substring
    #[arg(long, global = true)]
    pub exact: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Search installed and available packages
    Search(SearchArgs),

    /// List installed packages and mark available updates
    List,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Text matched against package id, name, moniker and tags
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,
}

impl Cli {
    fn options(&self) -> SearchOptions {
        SearchOptions {
            catalog: self.catalog.clone(),
            behavior: self.behavior,
            max_results: self.max_results,
            exact: self.exact,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = pkgcorr::runtime::RealRuntime;
    let options = cli.options();

    match &cli.command {
        Commands::Search(args) => commands::search(runtime, args.query.as_deref(), &options)?,
        Commands::List => commands::list(runtime, &options)?,
    }
    Ok(())
}
