//! catalog-harvest: an id-range catalog crawler
//!
//! This crate crawls a remote catalog by numeric id with a pool of workers
//! that share two scarce resources, egress proxies and authenticated
//! sessions. A single coordinator task admits work, leases resources,
//! applies results, persists output and reports progress.

pub mod config;
pub mod crawler;
pub mod input;
pub mod output;
pub mod pool;
pub mod storage;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for catalog-harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Errors reading id, proxy and login lists
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: invalid id '{value}'")]
    InvalidId {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("{path}:{line}: expected '<ip> <port>', got '{value}'")]
    InvalidProxy {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("{path}:{line}: expected '<username> <password>', got '{value}'")]
    InvalidLogin {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("No credentials: pass --user, provide a login file, or set [account]")]
    NoCredentials,
}

/// Result type alias for catalog-harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for input loading
pub type InputResult<T> = std::result::Result<T, InputError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, HttpFetcher, RunOutcome, RunReport};
pub use pool::{CredentialPool, Egress, ProxyPool};
