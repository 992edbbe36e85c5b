//! Worker tasks executing auth and fetch tasks
//!
//! Each worker loops: take a task, run it, send exactly one result. The
//! fetcher call runs in its own spawned task so that a panic inside it is
//! caught and reported as an error result instead of killing the worker.
//! Workers exit on a [`Task::Stop`] sentinel or when the shared
//! cancellation token fires; on cancellation no result is sent.

use crate::crawler::fetcher::{Fetcher, Page};
use crate::crawler::queue::TaskQueue;
use crate::crawler::task::{AuthRequest, Failure, FetchOutcome, FetchRequest, Task, TaskResult};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Fixed-size set of worker tasks sharing one task queue
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    queue: TaskQueue,
}

impl WorkerPool {
    /// Spawns `count` workers
    ///
    /// # Arguments
    ///
    /// * `count` - Number of workers
    /// * `queue` - Queue the workers take tasks from
    /// * `results` - Channel each result is sent on
    /// * `fetcher` - Catalog access shared by all workers
    /// * `fetch_delay` - Pause before every item fetch
    /// * `cancel` - Interrupt signal; workers exit without a result
    pub fn spawn(
        count: usize,
        queue: TaskQueue,
        results: UnboundedSender<TaskResult>,
        fetcher: Arc<dyn Fetcher>,
        fetch_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let handles = (0..count)
            .map(|index| {
                let worker = Worker {
                    queue: queue.clone(),
                    results: results.clone(),
                    fetcher: Arc::clone(&fetcher),
                    fetch_delay,
                    cancel: cancel.clone(),
                };
                tokio::spawn(
                    worker
                        .run()
                        .instrument(tracing::info_span!("worker", index = index + 1)),
                )
            })
            .collect();

        Self { handles, queue }
    }

    /// Number of workers spawned
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Number of workers still running
    pub fn alive_count(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Enqueues one stop sentinel per worker
    pub fn stop(&self) {
        for _ in &self.handles {
            self.queue.push(Task::Stop);
        }
    }
}

struct Worker {
    queue: TaskQueue,
    results: UnboundedSender<TaskResult>,
    fetcher: Arc<dyn Fetcher>,
    fetch_delay: Duration,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        tracing::debug!("Worker started");

        loop {
            let task = tokio::select! {
                task = self.queue.take() => task,
                () = self.cancel.cancelled() => break,
            };

            let result = match task {
                None | Some(Task::Stop) => break,
                Some(Task::Auth(request)) => self.authenticate(request).await,
                Some(Task::Fetch(request)) => self.fetch(request).await,
            };

            // None means interrupted mid-task
            let Some(result) = result else { break };
            if self.results.send(result).is_err() {
                break;
            }
        }

        tracing::debug!("Worker stopped");
    }

    async fn authenticate(&self, request: AuthRequest) -> Option<TaskResult> {
        tracing::info!("Authenticating {} via {}", request.username, request.egress);

        let username = request.username.clone();
        let egress = request.egress.clone();
        let fetcher = Arc::clone(&self.fetcher);

        let joined = self
            .guarded(async move { fetcher.authenticate(&request).await })
            .await?;

        let outcome = match joined {
            Ok(Ok(cookie)) => Ok(cookie),
            Ok(Err(error)) => Err(error.to_failure()),
            Err(error) => Err(panic_failure(error)),
        };

        Some(TaskResult::Auth {
            username,
            egress,
            outcome,
        })
    }

    async fn fetch(&self, request: FetchRequest) -> Option<TaskResult> {
        tokio::select! {
            () = tokio::time::sleep(self.fetch_delay) => {}
            () = self.cancel.cancelled() => return None,
        }

        tracing::debug!(
            "Fetching {} as {} via {}",
            request.id,
            request.session.username,
            request.egress
        );

        let id = request.id;
        let session = request.session.clone();
        let egress = request.egress.clone();
        let fetcher = Arc::clone(&self.fetcher);

        let joined = self
            .guarded(async move { fetcher.fetch(&request).await })
            .await?;

        let outcome = match joined {
            Ok(Ok(Page::Content(record))) => FetchOutcome::Ok(record),
            Ok(Ok(Page::NoHash)) => FetchOutcome::NoHash,
            Ok(Err(error)) => FetchOutcome::Error(error.to_failure()),
            Err(error) => FetchOutcome::Error(panic_failure(error)),
        };

        Some(TaskResult::Fetch {
            id,
            session,
            egress,
            outcome,
        })
    }

    /// Runs `call` in its own task, aborting it on cancellation
    async fn guarded<F>(&self, call: F) -> Option<Result<F::Output, JoinError>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let mut handle = tokio::spawn(call.in_current_span());
        tokio::select! {
            joined = &mut handle => Some(joined),
            () = self.cancel.cancelled() => {
                handle.abort();
                None
            }
        }
    }
}

/// Turns a crashed fetcher call into a classified failure
fn panic_failure(error: JoinError) -> Failure {
    let text = if error.is_panic() {
        panic_message(error.into_panic())
    } else {
        "fetch task cancelled".to_string()
    };

    tracing::error!("Fetcher crashed: {}", text);
    Failure::from_text(text)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "panic with non-string payload".to_string()),
    }
}
