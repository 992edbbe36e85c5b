//! Ids waiting to be dispatched

use std::collections::{HashSet, VecDeque};

/// FIFO of ids not yet dispatched, without duplicates
///
/// An id leaves the backlog when a fetch task is created for it and comes
/// back only when that task fails, so at any moment it is in at most one of
/// the backlog, the task queue or a worker.
#[derive(Debug, Clone, Default)]
pub struct Backlog {
    ids: VecDeque<u64>,
    members: HashSet<u64>,
}

impl Backlog {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        let mut backlog = Self::default();
        for id in ids {
            backlog.push_back(id);
        }
        backlog
    }

    /// Next id to dispatch
    pub fn peek(&self) -> Option<u64> {
        self.ids.front().copied()
    }

    pub fn pop(&mut self) -> Option<u64> {
        let id = self.ids.pop_front()?;
        self.members.remove(&id);
        Some(id)
    }

    /// Appends `id` for a later retry; returns false if already waiting
    pub fn push_back(&mut self, id: u64) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.ids.push_back(id);
        true
    }

    pub fn contains(&self, id: u64) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
