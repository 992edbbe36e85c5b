//! Leasable resource pools
//!
//! This module provides the two scarce resources shared by all workers:
//!
//! - `ProxyPool`: egress endpoints, skipped once they fail too often
//! - `CredentialPool`: catalog accounts, invalidated once they fail too often
//!
//! Both are thin specializations of the generic `ResourcePool`, which tracks
//! per-resource lease counts and failure counts and selects the least-failed
//! eligible resource.

mod credential;
mod proxy;
mod resource;

pub use credential::{
    Credential, CredentialPool, Penalty, Session, CREDENTIAL_INVALIDATION_THRESHOLD,
};
pub use proxy::{Egress, Proxy, ProxyPool, PROXY_EXCLUSION_THRESHOLD};
pub use resource::{Entry, Resource, ResourcePool};
