//! Generic leasing container shared by the proxy and credential pools

use rand::seq::SliceRandom;
use std::fmt;

/// A resource that can be leased out of a [`ResourcePool`]
pub trait Resource: Clone {
    /// Identity used to find the resource again on release or penalty
    type Key: ?Sized + PartialEq + fmt::Debug;

    /// Returns the identity of this resource
    fn key(&self) -> &Self::Key;

    /// Whether the resource can be handed out at all
    ///
    /// Credentials without a session cookie are not usable; proxies always are.
    fn is_usable(&self) -> bool {
        true
    }
}

/// Bookkeeping attached to one resource in a pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<R> {
    /// The resource itself
    pub resource: R,

    /// Number of outstanding leases
    pub in_use: usize,

    /// Number of recorded failures, never decreases
    pub fail_count: u32,
}

/// A fixed set of resources leased out under a per-resource concurrency cap
///
/// Selection is least-failures-first with a random tie-break: the eligible
/// candidates are shuffled and the first one with the minimum `fail_count`
/// wins. A resource is eligible while `in_use < cap`, its `fail_count` does
/// not exceed the exclusion threshold, and it reports itself usable.
///
/// The pool does no locking. It is owned by the coordinator task and only
/// mutated from there.
#[derive(Debug, Clone)]
pub struct ResourcePool<R> {
    entries: Vec<Entry<R>>,
    cap: usize,
    exclusion_threshold: u32,
}

impl<R: Resource> ResourcePool<R> {
    /// Creates a pool over `resources`, all idle and without failures
    ///
    /// Resources repeating an earlier key are dropped, so each identity has
    /// exactly one entry.
    ///
    /// # Arguments
    ///
    /// * `resources` - The resources managed by the pool, in order
    /// * `cap` - Maximum concurrent leases per resource
    /// * `exclusion_threshold` - Resources with more failures than this are skipped
    pub fn new(resources: impl IntoIterator<Item = R>, cap: usize, exclusion_threshold: u32) -> Self {
        let mut entries: Vec<Entry<R>> = Vec::new();
        for resource in resources {
            if entries.iter().any(|entry| entry.resource.key() == resource.key()) {
                tracing::warn!("Skipping duplicate resource {:?}", resource.key());
                continue;
            }
            entries.push(Entry {
                resource,
                in_use: 0,
                fail_count: 0,
            });
        }

        Self {
            entries,
            cap,
            exclusion_threshold,
        }
    }

    /// Leases the best eligible resource
    ///
    /// # Returns
    ///
    /// * `Some(R)` - A copy of the leased resource; its `in_use` was incremented
    /// * `None` - Nothing is eligible; no entry was touched
    pub fn lease(&mut self) -> Option<R> {
        let mut eligible: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| self.is_eligible(entry))
            .map(|(index, _)| index)
            .collect();

        eligible.shuffle(&mut rand::thread_rng());

        let chosen = eligible
            .into_iter()
            .min_by_key(|&index| self.entries[index].fail_count)?;

        let entry = &mut self.entries[chosen];
        entry.in_use += 1;
        Some(entry.resource.clone())
    }

    /// Returns one lease on the resource identified by `key`
    ///
    /// Unknown keys are ignored: a worker may hold a stale copy of a resource.
    /// Returns whether a matching resource was found.
    pub fn release(&mut self, key: &R::Key) -> bool {
        match self.entry_mut(key) {
            Some(entry) => {
                entry.in_use = entry.in_use.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// Records one failure against the resource identified by `key`
    ///
    /// Returns the new failure count, or `None` if the key is unknown.
    pub fn penalize(&mut self, key: &R::Key) -> Option<u32> {
        let entry = self.entry_mut(key)?;
        entry.fail_count = entry.fail_count.saturating_add(1);
        Some(entry.fail_count)
    }

    /// Looks up the entry for `key`
    pub fn get(&self, key: &R::Key) -> Option<&Entry<R>> {
        self.entries.iter().find(|entry| entry.resource.key() == key)
    }

    pub(crate) fn entry_mut(&mut self, key: &R::Key) -> Option<&mut Entry<R>> {
        self.entries
            .iter_mut()
            .find(|entry| entry.resource.key() == key)
    }

    /// Iterates over all entries in pool order
    pub fn iter(&self) -> impl Iterator<Item = &Entry<R>> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entry<R>> {
        self.entries.iter_mut()
    }

    /// Number of resources in the pool
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the pool manages no resources
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of outstanding leases across the pool
    pub fn leased(&self) -> usize {
        self.entries.iter().map(|entry| entry.in_use).sum()
    }

    fn is_eligible(&self, entry: &Entry<R>) -> bool {
        entry.in_use < self.cap
            && entry.fail_count <= self.exclusion_threshold
            && entry.resource.is_usable()
    }
}
