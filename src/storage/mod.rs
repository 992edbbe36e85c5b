//! Storage module for persisting run output
//!
//! This module handles everything a run writes to disk:
//! - The append-only table log and finished-ids log
//! - One content file per fetched id, sharded by `id / 100000`
//! - The credential snapshot that lets session cookies survive a restart

mod credentials;
mod files;
mod traits;

pub use credentials::CredentialStore;
pub use files::{content_path, FileStorage, SHARD_SIZE};
pub use traits::{Storage, StorageError, StorageResult};
