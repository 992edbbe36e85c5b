//! Proxy pool: egress endpoints leased per task

use crate::pool::resource::{Entry, Resource, ResourcePool};
use std::fmt;

/// Proxies with more failures than this are no longer selected
pub const PROXY_EXCLUSION_THRESHOLD: u32 = 1000;

/// A network egress endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proxy {
    pub ip: String,
    pub port: u16,
}

impl Proxy {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl Resource for Proxy {
    type Key = Proxy;

    fn key(&self) -> &Proxy {
        self
    }
}

/// The route a task takes to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Egress {
    /// Proxying is disabled; connect directly
    Direct,

    /// Connect through a leased proxy
    Proxy(Proxy),
}

impl Egress {
    /// Returns the proxy for this route, if any
    pub fn proxy(&self) -> Option<&Proxy> {
        match self {
            Self::Direct => None,
            Self::Proxy(proxy) => Some(proxy),
        }
    }
}

impl fmt::Display for Egress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Proxy(proxy) => proxy.fmt(f),
        }
    }
}

/// Pool of proxies, or a direct route when proxying is disabled
///
/// Proxies are never invalidated. A proxy whose failure count passes
/// [`PROXY_EXCLUSION_THRESHOLD`] is simply skipped by [`ProxyPool::lease`].
/// In direct mode every lease succeeds and release/penalize do nothing.
#[derive(Debug, Clone)]
pub enum ProxyPool {
    Direct,
    Pooled(ResourcePool<Proxy>),
}

impl ProxyPool {
    /// Creates a pool over `proxies` with the given per-proxy concurrency cap
    pub fn new(proxies: Vec<Proxy>, cap: usize) -> Self {
        Self::Pooled(ResourcePool::new(proxies, cap, PROXY_EXCLUSION_THRESHOLD))
    }

    /// Creates a pool that always routes directly
    pub fn direct() -> Self {
        Self::Direct
    }

    /// Leases an egress route for one task
    pub fn lease(&mut self) -> Option<Egress> {
        match self {
            Self::Direct => Some(Egress::Direct),
            Self::Pooled(pool) => pool.lease().map(Egress::Proxy),
        }
    }

    /// Returns a lease taken by [`ProxyPool::lease`]
    pub fn release(&mut self, egress: &Egress) {
        if let (Self::Pooled(pool), Egress::Proxy(proxy)) = (self, egress) {
            if !pool.release(proxy) {
                tracing::debug!("Released unknown proxy {}", proxy);
            }
        }
    }

    /// Records a transport failure against the proxy behind `egress`
    pub fn penalize(&mut self, egress: &Egress) -> Option<u32> {
        match (self, egress) {
            (Self::Pooled(pool), Egress::Proxy(proxy)) => {
                let fails = pool.penalize(proxy)?;
                if fails == PROXY_EXCLUSION_THRESHOLD + 1 {
                    tracing::warn!("Proxy {} excluded after {} failures", proxy, fails);
                }
                Some(fails)
            }
            _ => None,
        }
    }

    /// Returns the bookkeeping entry for `proxy`
    pub fn get(&self, proxy: &Proxy) -> Option<&Entry<Proxy>> {
        match self {
            Self::Direct => None,
            Self::Pooled(pool) => pool.get(proxy),
        }
    }

    /// Number of proxies managed (zero in direct mode)
    pub fn len(&self) -> usize {
        match self {
            Self::Direct => 0,
            Self::Pooled(pool) => pool.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }
}
