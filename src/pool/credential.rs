//! Credential pool: authenticated sessions leased per fetch

use crate::pool::resource::{Entry, Resource, ResourcePool};
use serde::{Deserialize, Serialize};

/// Credentials with more failures than this lose their session cookie
pub const CREDENTIAL_INVALIDATION_THRESHOLD: u32 = 5;

/// A catalog account, with a session cookie once authenticated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            cookie: None,
        }
    }
}

impl Resource for Credential {
    type Key = str;

    fn key(&self) -> &str {
        &self.username
    }

    fn is_usable(&self) -> bool {
        self.cookie.as_deref().is_some_and(|cookie| !cookie.is_empty())
    }
}

/// The part of a credential a worker needs to fetch a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub cookie: String,
}

/// Outcome of recording a failure against a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    /// Failure counted, credential still usable
    Counted(u32),

    /// Failure counted and the session cookie was dropped
    Invalidated(u32),

    /// No credential with that username
    Unknown,
}

/// Pool of catalog accounts
///
/// A credential is leasable only while it holds a session cookie. Once its
/// failure count exceeds [`CREDENTIAL_INVALIDATION_THRESHOLD`] the cookie is
/// cleared; the caller is expected to persist the pool snapshot right away.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    pool: ResourcePool<Credential>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>, cap: usize) -> Self {
        Self {
            pool: ResourcePool::new(credentials, cap, CREDENTIAL_INVALIDATION_THRESHOLD),
        }
    }

    /// Leases an authenticated session
    pub fn lease(&mut self) -> Option<Session> {
        self.pool.lease().map(|credential| Session {
            cookie: credential.cookie.unwrap_or_default(),
            username: credential.username,
        })
    }

    /// Returns a lease taken by [`CredentialPool::lease`]
    pub fn release(&mut self, username: &str) {
        if !self.pool.release(username) {
            tracing::debug!("Released unknown credential {}", username);
        }
    }

    /// Records an authentication failure against `username`
    pub fn penalize(&mut self, username: &str) -> Penalty {
        let Some(fails) = self.pool.penalize(username) else {
            return Penalty::Unknown;
        };

        if fails <= CREDENTIAL_INVALIDATION_THRESHOLD {
            return Penalty::Counted(fails);
        }

        let Some(entry) = self.pool.entry_mut(username) else {
            return Penalty::Unknown;
        };

        if entry.resource.cookie.take().is_some() {
            tracing::warn!(
                "Credential {} removed from pool after {} failures",
                username,
                fails
            );
        }
        Penalty::Invalidated(fails)
    }

    /// Stores a fresh session cookie for `username`
    ///
    /// Returns false if no such credential exists.
    pub fn set_cookie(&mut self, username: &str, cookie: String) -> bool {
        match self.pool.entry_mut(username) {
            Some(entry) => {
                entry.resource.cookie = Some(cookie);
                true
            }
            None => false,
        }
    }

    /// Credentials that still need to authenticate
    pub fn tokenless(&self) -> Vec<Credential> {
        self.pool
            .iter()
            .filter(|entry| !entry.resource.is_usable())
            .filter(|entry| entry.fail_count <= CREDENTIAL_INVALIDATION_THRESHOLD)
            .map(|entry| entry.resource.clone())
            .collect()
    }

    /// Serializable view of every credential, in pool order
    pub fn snapshot(&self) -> Vec<Credential> {
        self.pool.iter().map(|entry| entry.resource.clone()).collect()
    }

    /// Restores session cookies from a previously saved snapshot
    ///
    /// Records are matched by username; records without a cookie and
    /// usernames not in the pool are ignored. Returns the number restored.
    pub fn apply_snapshot(&mut self, records: &[Credential]) -> usize {
        let mut restored = 0;

        for record in records {
            let Some(cookie) = record.cookie.as_ref().filter(|c| !c.is_empty()) else {
                continue;
            };

            if let Some(entry) = self
                .pool
                .iter_mut()
                .find(|entry| entry.resource.username == record.username)
            {
                entry.resource.cookie = Some(cookie.clone());
                restored += 1;
            }
        }

        restored
    }

    pub fn get(&self, username: &str) -> Option<&Entry<Credential>> {
        self.pool.get(username)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Number of credentials currently holding a session cookie
    pub fn authenticated(&self) -> usize {
        self.pool
            .iter()
            .filter(|entry| entry.resource.is_usable())
            .count()
    }
}
