//! Crawler module for catalog harvesting
//!
//! This module contains the core harvesting logic, including:
//! - Task and result messages passed between coordinator and workers
//! - The shared task queue and the worker pool
//! - Catalog login, item fetch and page parsing
//! - Result application and the coordinating control loop

mod backlog;
mod coordinator;
mod fetcher;
mod parser;
mod queue;
mod results;
mod task;
mod worker;

pub use backlog::Backlog;
pub use coordinator::{Coordinator, RunOutcome, RunReport};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher, Page};
pub use parser::PageParser;
pub use queue::TaskQueue;
pub use results::{CrawlState, ResultProcessor};
pub use task::{
    AuthRequest, ContentRecord, Failure, FailureKind, FetchOutcome, FetchRequest, HeaderTemplate,
    Headers, Task, TaskResult,
};
pub use worker::WorkerPool;
