//! CLI commands over a catalog file.
//!
//! # Structure
//!
//! - `paths` - Catalog location
//! - `search` - `search` and `list`, plus result rendering

mod paths;
mod search;

pub use paths::{catalog_path, default_catalog_path};
pub use search::{SearchOptions, list, search};
