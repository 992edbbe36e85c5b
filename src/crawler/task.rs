//! Messages exchanged between the coordinator and the workers
//!
//! Tasks flow coordinator → workers, results flow back. Everything is moved
//! by value; a worker never sees the pools, only copies of what it leased.

use crate::pool::{Egress, Session};
use rand::seq::SliceRandom;

/// Request headers sent with one fetch
pub type Headers = Vec<(String, String)>;

/// Log in with a credential to obtain a session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
    pub egress: Egress,
}

/// Fetch and parse one catalog item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: u64,
    pub session: Session,
    pub egress: Egress,
    pub headers: Headers,
}

/// Unit of work taken by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Auth(AuthRequest),
    Fetch(FetchRequest),

    /// Sentinel: the worker that takes it exits
    Stop,
}

/// Which resource a failure should be charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The session was rejected; charge the credential
    Auth,

    /// The request never completed; charge the proxy
    Transport,

    /// Anything else; charge nobody
    Other,
}

impl FailureKind {
    /// Classifies a free-form failure message
    ///
    /// Used where no typed error is available, e.g. a panic inside the fetch
    /// collaborator.
    pub fn classify(text: &str) -> Self {
        let text = text.to_ascii_lowercase();

        if ["not logined", "not logged in", "logged out", "session expired"]
            .iter()
            .any(|marker| text.contains(marker))
        {
            return Self::Auth;
        }

        if ["request exception", "timeout", "timed out", "connection", "proxy"]
            .iter()
            .any(|marker| text.contains(marker))
        {
            return Self::Transport;
        }

        Self::Other
    }
}

/// A classified, human-readable failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub text: String,
}

impl Failure {
    pub fn new(kind: FailureKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Builds a failure whose kind is derived from its message
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind: FailureKind::classify(&text),
            text,
        }
    }
}

/// Parsed content of one catalog item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub id: u64,

    /// Tab-separated line for the table log
    pub line: String,

    /// Raw page text for the content file
    pub text: String,
}

/// Outcome of a fetch task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok(ContentRecord),

    /// The page exists but carries no hash; finished without content
    NoHash,

    Error(Failure),
}

/// Result of one task, carrying the leases it used so they can be returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    Auth {
        username: String,
        egress: Egress,
        outcome: Result<String, Failure>,
    },
    Fetch {
        id: u64,
        session: Session,
        egress: Egress,
        outcome: FetchOutcome,
    },
}

/// Headers attached to every fetch, plus an optional user-agent rotation
#[derive(Debug, Clone, Default)]
pub struct HeaderTemplate {
    base: Headers,
    user_agents: Vec<String>,
}

impl HeaderTemplate {
    pub fn new(base: Headers, user_agents: Vec<String>) -> Self {
        Self { base, user_agents }
    }

    /// Headers for the next fetch, with a randomly chosen user agent
    pub fn build(&self) -> Headers {
        let mut headers = self.base.clone();
        if let Some(agent) = self.user_agents.choose(&mut rand::thread_rng()) {
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("user-agent"));
            headers.push(("User-Agent".to_string(), agent.clone()));
        }
        headers
    }
}
