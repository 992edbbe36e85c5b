//! Output module for progress reports and run summaries
//!
//! This module handles:
//! - Periodic throughput reports with an ETA
//! - The summary printed when a run ends

pub mod stats;

pub use stats::{
    format_eta, print_summary, OutcomeCounts, ProgressReport, ResultKind, RunSummary,
    ThroughputStats,
};
