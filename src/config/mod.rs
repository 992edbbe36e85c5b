//! Configuration module for catalog-harvest
//!
//! A run is configured from two places: the site description, a TOML file
//! naming the login and item endpoints, selectors, headers and timing, and the
//! per-run options given on the command line.
//!
//! # Example
//!
//! ```no_run
//! use catalog_harvest::config::load_site_config;
//! use std::path::Path;
//!
//! let site = load_site_config(Path::new("harvest.toml")).unwrap();
//! println!("Fetch delay: {}ms", site.timing.fetch_delay_ms);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    AccountConfig, Config, IdSource, OutputConfig, RunOptions, SiteConfig, SiteEndpoints,
    TimingConfig,
};

pub use parser::{
    compute_config_hash, load_site_config, load_site_config_with_hash, parse_site_config,
};
pub use validation::{validate_run, validate_site};
