//! Applying task results to the crawl state
//!
//! Every result returns the leases it carried, then:
//! - a successful login stores the session cookie and rewrites the snapshot
//! - an item with a hash is written to the content folder, table and finished log
//! - an item without a hash is written to the finished log only
//! - a failed fetch charges the credential or the proxy and requeues the id
//!
//! Nothing here awaits, so a result is applied completely or not at all.

use crate::crawler::backlog::Backlog;
use crate::crawler::task::{ContentRecord, FailureKind, FetchOutcome, TaskResult};
use crate::output::ResultKind;
use crate::pool::{CredentialPool, Egress, Penalty, ProxyPool, Session};
use crate::storage::{CredentialStore, Storage, StorageResult};
use std::collections::HashSet;

/// Everything the coordinator owns and results mutate
#[derive(Debug)]
pub struct CrawlState {
    pub backlog: Backlog,
    pub proxies: ProxyPool,
    pub credentials: CredentialPool,
}

/// Applies results and persists their output
pub struct ResultProcessor {
    storage: Box<dyn Storage + Send>,
    credential_store: CredentialStore,
    // Ids whose table line is written but whose finished entry is not
    tabled: HashSet<u64>,
}

impl ResultProcessor {
    pub fn new(storage: Box<dyn Storage + Send>, credential_store: CredentialStore) -> Self {
        Self {
            storage,
            credential_store,
            tabled: HashSet::new(),
        }
    }

    /// Applies one result to `state`
    ///
    /// # Arguments
    ///
    /// * `state` - Backlog and resource pools
    /// * `result` - A result sent by a worker
    ///
    /// # Returns
    ///
    /// How the result should be counted. A fetch whose output could not be
    /// stored counts as an error and its id is requeued.
    pub fn apply(&mut self, state: &mut CrawlState, result: TaskResult) -> ResultKind {
        match result {
            TaskResult::Auth {
                username,
                egress,
                outcome,
            } => {
                state.proxies.release(&egress);

                match outcome {
                    Ok(cookie) => {
                        tracing::info!("Authenticated {} via {}", username, egress);
                        state.credentials.set_cookie(&username, cookie);
                        self.save_credentials(&state.credentials);
                        ResultKind::AuthOk
                    }
                    Err(failure) => {
                        tracing::error!("Failed to authenticate {}: {}", username, failure.text);
                        ResultKind::AuthError
                    }
                }
            }
            TaskResult::Fetch {
                id,
                session,
                egress,
                outcome,
            } => self.apply_fetch(state, id, session, egress, outcome),
        }
    }

    fn apply_fetch(
        &mut self,
        state: &mut CrawlState,
        id: u64,
        session: Session,
        egress: Egress,
        outcome: FetchOutcome,
    ) -> ResultKind {
        state.proxies.release(&egress);
        state.credentials.release(&session.username);

        match outcome {
            FetchOutcome::Ok(record) => {
                tracing::debug!("OK {}", id);
                if let Err(e) = self.store_record(&record) {
                    tracing::error!("Failed to store item {}: {}", id, e);
                    state.backlog.push_back(id);
                    return ResultKind::Error;
                }
                ResultKind::Ok
            }
            FetchOutcome::NoHash => {
                tracing::debug!("NOHASH {}", id);
                if let Err(e) = self.storage.append_finished(id) {
                    tracing::error!("Failed to record item {}: {}", id, e);
                    state.backlog.push_back(id);
                    return ResultKind::Error;
                }
                ResultKind::NoHash
            }
            FetchOutcome::Error(failure) => {
                tracing::warn!("ERROR {} via {}: {}", id, egress, failure.text);

                match failure.kind {
                    FailureKind::Auth => {
                        if let Penalty::Invalidated(_) =
                            state.credentials.penalize(&session.username)
                        {
                            self.save_credentials(&state.credentials);
                        }
                    }
                    FailureKind::Transport => {
                        state.proxies.penalize(&egress);
                    }
                    FailureKind::Other => {}
                }

                state.backlog.push_back(id);
                ResultKind::Error
            }
        }
    }

    /// Content first, finished log last, so a resumed run never skips an
    /// item whose content is missing
    ///
    /// A retried id whose table line already went out does not append it again.
    fn store_record(&mut self, record: &ContentRecord) -> StorageResult<()> {
        self.storage.write_content(record.id, &record.text)?;

        if !self.tabled.contains(&record.id) {
            self.storage.append_table(&record.line)?;
            self.tabled.insert(record.id);
        }

        self.storage.append_finished(record.id)?;
        self.tabled.remove(&record.id);
        Ok(())
    }

    /// Rewrites the credential snapshot; failures are logged, not fatal
    pub fn save_credentials(&self, credentials: &CredentialPool) {
        if let Err(e) = self.credential_store.save(&credentials.snapshot()) {
            tracing::error!(
                "Failed to save credentials to {}: {}",
                self.credential_store.path().display(),
                e
            );
        }
    }

    pub fn flush(&mut self) -> StorageResult<()> {
        self.storage.flush()
    }
}
