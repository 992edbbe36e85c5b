//! Crawler coordinator - main harvest orchestration logic
//!
//! This module contains the control loop that owns all mutable crawl state:
//! - Loading the backlog, proxies, credentials and saved session cookies
//! - Admitting work while task queue capacity and resources allow
//! - Applying results and persisting output
//! - Periodic progress reports
//! - Detecting idleness, dead workers and interrupts

use crate::config::{Config, RunOptions, TimingConfig};
use crate::crawler::backlog::Backlog;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::queue::TaskQueue;
use crate::crawler::results::{CrawlState, ResultProcessor};
use crate::crawler::task::{AuthRequest, FetchRequest, HeaderTemplate, Task, TaskResult};
use crate::crawler::worker::WorkerPool;
use crate::input::{load_credentials, load_proxies, prepare_backlog, ProxySource};
use crate::output::{RunSummary, ThroughputStats};
use crate::pool::{Credential, CredentialPool, ProxyPool};
use crate::storage::{CredentialStore, FileStorage};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Concurrent leases allowed per proxy and per credential
const LEASE_CAP: usize = 1;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Queues stayed empty long enough; workers were stopped
    Completed,

    /// The cancellation token fired
    Interrupted,

    /// Every worker exited while work was expected
    WorkersLost,

    /// Inputs were loaded and printed; nothing was fetched
    PrintOnly,

    /// Nothing left to fetch after filtering
    EmptyInput,
}

/// Outcome and counters of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub summary: RunSummary,
}

/// Main harvest coordinator
pub struct Coordinator {
    options: RunOptions,
    timing: TimingConfig,
    headers: HeaderTemplate,
    state: CrawlState,
    processor: ResultProcessor,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator from the run configuration
    ///
    /// Loads every input list, restores saved session cookies and opens the
    /// output logs.
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `fetcher` - Catalog access handed to the workers
    /// * `cancel` - Interrupt signal for the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - An input file or an output log failed to open
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        cancel: CancellationToken,
    ) -> crate::Result<Self> {
        let backlog = prepare_backlog(&config.run)?;

        let proxies = match load_proxies(&config.run)? {
            ProxySource::Direct => ProxyPool::direct(),
            ProxySource::File(proxies) => ProxyPool::new(proxies, LEASE_CAP),
            ProxySource::Local(proxy) => ProxyPool::new(vec![proxy], LEASE_CAP),
        };

        let mut credentials = CredentialPool::new(
            load_credentials(&config.run, config.site.account.as_ref())?,
            LEASE_CAP,
        );

        let store = CredentialStore::new(config.run.output.cookies_path.clone());
        let restored = credentials.apply_snapshot(&store.load()?);
        if restored > 0 {
            tracing::info!(
                "Restored {} session cookies from {}",
                restored,
                store.path().display()
            );
        }

        let storage = FileStorage::open(&config.run.output)?;

        Ok(Self::with_parts(
            config,
            CrawlState {
                backlog: Backlog::new(backlog),
                proxies,
                credentials,
            },
            ResultProcessor::new(Box::new(storage), store),
            fetcher,
            cancel,
        ))
    }

    /// Creates a coordinator from already loaded state
    pub fn with_parts(
        config: Config,
        state: CrawlState,
        processor: ResultProcessor,
        fetcher: Arc<dyn Fetcher>,
        cancel: CancellationToken,
    ) -> Self {
        let headers = HeaderTemplate::new(
            config
                .site
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            config.site.user_agents.clone(),
        );

        Self {
            options: config.run,
            timing: config.site.timing,
            headers,
            state,
            processor,
            fetcher,
            cancel,
        }
    }

    /// Backlog and resource pools, for inspection after a run
    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Runs the control loop until the work is done or the run is cut short
    ///
    /// Each iteration:
    /// 1. Reports progress when the report interval has elapsed
    /// 2. Admits pending logins, then fetches while the queue has room
    /// 3. Counts idle passes; too many in a row stops the workers
    /// 4. Waits briefly for one result and applies it
    ///
    /// Output logs are flushed on every exit path.
    pub async fn run(&mut self) -> crate::Result<RunReport> {
        let started = Instant::now();
        let mut stats = ThroughputStats::new(self.timing.report_interval(), started);

        let outcome = if self.options.print_only {
            self.print_inputs();
            RunOutcome::PrintOnly
        } else if self.state.backlog.is_empty() {
            tracing::info!("Empty input/left list. Terminated");
            RunOutcome::EmptyInput
        } else {
            self.control_loop(&mut stats).await
        };

        if let Err(e) = self.processor.flush() {
            tracing::error!("Failed to flush output logs: {}", e);
        }

        let (auth_ok, auth_error) = stats.auth_counts();
        Ok(RunReport {
            outcome,
            summary: RunSummary {
                totals: stats.totals(),
                auth_ok,
                auth_error,
                remaining: self.state.backlog.len(),
                elapsed: started.elapsed(),
            },
        })
    }

    async fn control_loop(&mut self, stats: &mut ThroughputStats) -> RunOutcome {
        let workers_count = self.options.workers;
        let queue_size = self.options.effective_queue_size();
        tracing::info!(
            "Starting {} workers, queue size {}, {} ids",
            workers_count,
            queue_size,
            self.state.backlog.len()
        );

        let queue = TaskQueue::new();
        let (results_tx, mut results) = mpsc::unbounded_channel::<TaskResult>();
        let workers = WorkerPool::spawn(
            workers_count,
            queue.clone(),
            results_tx,
            Arc::clone(&self.fetcher),
            self.timing.fetch_delay(),
            self.cancel.clone(),
        );

        let mut pending_auth: VecDeque<Credential> = self.state.credentials.tokenless().into();
        let mut notices = Notices::new(self.timing.notice_interval());
        let mut in_flight = 0usize;
        let mut idle_passes = 0u32;

        let outcome = loop {
            if self.cancel.is_cancelled() {
                break RunOutcome::Interrupted;
            }

            let now = Instant::now();
            if stats.due(now) {
                tracing::info!("{}", stats.roll(self.state.backlog.len(), now));
            }

            in_flight += self.admit(&queue, queue_size, &mut pending_auth, &mut notices);

            if queue.is_empty() && results.is_empty() && in_flight == 0 {
                if idle_passes > 1 {
                    tracing::info!("Queues are empty.");
                }

                tokio::select! {
                    () = tokio::time::sleep(self.timing.idle_sleep()) => {}
                    () = self.cancel.cancelled() => break RunOutcome::Interrupted,
                }

                idle_passes += 1;
                if idle_passes > self.timing.idle_limit {
                    tracing::debug!("Stopping all workers");
                    workers.stop();
                    break RunOutcome::Completed;
                }
            } else {
                idle_passes = 0;
            }

            let received = tokio::select! {
                received = tokio::time::timeout(self.timing.result_wait(), results.recv()) => received,
                () = self.cancel.cancelled() => break RunOutcome::Interrupted,
            };

            match received {
                Ok(Some(result)) => {
                    in_flight = in_flight.saturating_sub(1);
                    let kind = self.processor.apply(&mut self.state, result);
                    stats.record(kind);
                }
                Ok(None) => {
                    tracing::error!("All workers are dead, exiting.");
                    break RunOutcome::WorkersLost;
                }
                Err(_) => {
                    if workers.alive_count() == 0 {
                        tracing::error!("All workers are dead, exiting.");
                        break RunOutcome::WorkersLost;
                    }
                }
            }
        };

        match outcome {
            RunOutcome::Completed if !self.state.backlog.is_empty() => {
                tracing::warn!(
                    "Stopped with {} ids left: no usable proxy or credential",
                    self.state.backlog.len()
                );
            }
            RunOutcome::Interrupted => tracing::info!("Interrupted, stopping"),
            _ => {}
        }

        outcome
    }

    /// Enqueues as much work as resources and queue capacity allow
    ///
    /// Returns the number of tasks enqueued.
    fn admit(
        &mut self,
        queue: &TaskQueue,
        queue_size: usize,
        pending_auth: &mut VecDeque<Credential>,
        notices: &mut Notices,
    ) -> usize {
        let mut enqueued = 0;

        // Logins are not bounded by the queue size
        while !pending_auth.is_empty() {
            let Some(egress) = self.state.proxies.lease() else {
                notices.no_free(ResourceKind::Proxy);
                return enqueued;
            };

            if let Some(credential) = pending_auth.pop_front() {
                queue.push(Task::Auth(AuthRequest {
                    username: credential.username,
                    password: credential.password,
                    egress,
                }));
                enqueued += 1;
            }
        }

        while queue.len() < queue_size {
            let Some(id) = self.state.backlog.peek() else {
                break;
            };

            let Some(egress) = self.state.proxies.lease() else {
                notices.no_free(ResourceKind::Proxy);
                break;
            };

            let Some(session) = self.state.credentials.lease() else {
                self.state.proxies.release(&egress);
                notices.no_free(ResourceKind::Credential);
                break;
            };

            self.state.backlog.pop();
            queue.push(Task::Fetch(FetchRequest {
                id,
                session,
                egress,
                headers: self.headers.build(),
            }));
            enqueued += 1;
        }

        enqueued
    }

    fn print_inputs(&self) {
        tracing::info!("Ids to fetch: {}", self.state.backlog.len());
        if self.state.proxies.is_direct() {
            tracing::info!("Proxies: none (direct)");
        } else {
            tracing::info!("Proxies: {}", self.state.proxies.len());
        }
        tracing::info!(
            "Credentials: {} ({} with a session cookie)",
            self.state.credentials.len(),
            self.state.credentials.authenticated()
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceKind {
    Proxy,
    Credential,
}

/// Rate limiter for "no free resource" notices, one window per kind
#[derive(Debug)]
struct Notices {
    every: Duration,
    next_proxy: Option<Instant>,
    next_credential: Option<Instant>,
}

impl Notices {
    fn new(every: Duration) -> Self {
        Self {
            every,
            next_proxy: None,
            next_credential: None,
        }
    }

    fn no_free(&mut self, kind: ResourceKind) {
        let now = Instant::now();
        let next = match kind {
            ResourceKind::Proxy => &mut self.next_proxy,
            ResourceKind::Credential => &mut self.next_credential,
        };

        if next.map_or(true, |at| now >= at) {
            match kind {
                ResourceKind::Proxy => tracing::info!("No free proxies are available"),
                ResourceKind::Credential => tracing::info!("No free credentials are available"),
            }
            *next = Some(now + self.every);
        }
    }
}
