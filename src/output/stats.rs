//! Throughput statistics and progress reporting
//!
//! This module provides functionality for:
//! - Counting applied results per reporting interval and in total
//! - Estimating the time left from the interval throughput
//! - Printing the end-of-run summary

use std::fmt;
use std::time::{Duration, Instant};

/// Classification of one applied result, as counted by the statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Ok,
    NoHash,
    Error,
    AuthOk,
    AuthError,
}

/// Fetch results by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub ok: u64,
    pub no_hash: u64,
    pub error: u64,
}

impl OutcomeCounts {
    /// Items that reached the finished log
    pub fn finished(&self) -> u64 {
        self.ok + self.no_hash
    }

    fn add(&mut self, other: &OutcomeCounts) {
        self.ok += other.ok;
        self.no_hash += other.no_hash;
        self.error += other.error;
    }
}

/// One periodic progress line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub interval: OutcomeCounts,
    pub interval_secs: u64,

    /// Finished items per second over the interval
    pub throughput: f64,

    /// Ids still waiting in the backlog
    pub remaining: usize,

    /// `None` when nothing finished during the interval
    pub eta: Option<Duration>,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Last {}s: {} - OK, {} - NOHASH, {} - ERROR, Remaining: {}, ETA {}",
            self.interval_secs,
            self.interval.ok,
            self.interval.no_hash,
            self.interval.error,
            self.remaining,
            format_eta(self.eta)
        )
    }
}

/// Formats an ETA as `H:MM`, or `0` when it cannot be estimated
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        None => "0".to_string(),
        Some(eta) => {
            let minutes = eta.as_secs() / 60;
            format!("{}:{:02}", minutes / 60, minutes % 60)
        }
    }
}

/// Interval and total counters for a run
#[derive(Debug, Clone)]
pub struct ThroughputStats {
    interval: OutcomeCounts,
    total: OutcomeCounts,
    auth_ok: u64,
    auth_error: u64,
    every: Duration,
    interval_start: Instant,
}

impl ThroughputStats {
    /// Starts counting at `now`, reporting every `every`
    pub fn new(every: Duration, now: Instant) -> Self {
        Self {
            interval: OutcomeCounts::default(),
            total: OutcomeCounts::default(),
            auth_ok: 0,
            auth_error: 0,
            every,
            interval_start: now,
        }
    }

    pub fn record(&mut self, kind: ResultKind) {
        match kind {
            ResultKind::Ok => self.interval.ok += 1,
            ResultKind::NoHash => self.interval.no_hash += 1,
            ResultKind::Error => self.interval.error += 1,
            ResultKind::AuthOk => self.auth_ok += 1,
            ResultKind::AuthError => self.auth_error += 1,
        }
    }

    /// Whether a report is due at `now`
    pub fn due(&self, now: Instant) -> bool {
        now.duration_since(self.interval_start) >= self.every
    }

    /// Closes the current interval and returns its report
    ///
    /// Interval counts are folded into the totals and reset.
    ///
    /// # Arguments
    ///
    /// * `remaining` - Ids still waiting in the backlog
    /// * `now` - End of the interval
    pub fn roll(&mut self, remaining: usize, now: Instant) -> ProgressReport {
        let elapsed = now.duration_since(self.interval_start).max(self.every);
        let throughput = self.interval.finished() as f64 / elapsed.as_secs_f64();

        let eta = (throughput > 0.0).then(|| Duration::from_secs_f64(remaining as f64 / throughput));

        let report = ProgressReport {
            interval: self.interval,
            interval_secs: elapsed.as_secs(),
            throughput,
            remaining,
            eta,
        };

        self.total.add(&self.interval);
        self.interval = OutcomeCounts::default();
        self.interval_start = now;
        report
    }

    /// Totals including the interval in progress
    pub fn totals(&self) -> OutcomeCounts {
        let mut totals = self.total;
        totals.add(&self.interval);
        totals
    }

    /// Successful and failed logins
    pub fn auth_counts(&self) -> (u64, u64) {
        (self.auth_ok, self.auth_error)
    }
}

/// Everything the final summary shows
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub totals: OutcomeCounts,
    pub auth_ok: u64,
    pub auth_error: u64,
    pub remaining: usize,
    pub elapsed: Duration,
}

/// Prints the end-of-run summary to stdout
///
/// # Arguments
///
/// * `summary` - The summary to display
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Items:");
    println!("  OK:      {}", summary.totals.ok);
    println!("  NOHASH:  {}", summary.totals.no_hash);
    println!("  ERROR:   {}", summary.totals.error);
    println!("  Left:    {}", summary.remaining);
    println!();

    println!("Logins:");
    println!("  OK:      {}", summary.auth_ok);
    println!("  ERROR:   {}", summary.auth_error);
    println!();

    let secs = summary.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.totals.finished() as f64 / secs
    } else {
        0.0
    };

    println!(
        "Finished {} items in {} ({:.2} items/s)",
        summary.totals.finished(),
        format_eta(Some(summary.elapsed)),
        rate
    );
}
