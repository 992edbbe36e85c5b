//! Catalog access: login and item fetch
//!
//! Workers talk to the catalog only through the [`Fetcher`] trait, so the
//! coordinator can be driven by a scripted fetcher in tests. The production
//! implementation, [`HttpFetcher`], handles:
//! - one HTTP client per egress route, proxied through SOCKS5
//! - form login and session cookie extraction
//! - item fetch with the session cookie and per-request headers
//! - error classification into credential, proxy or neither

use crate::config::{SiteConfig, SiteEndpoints};
use crate::crawler::parser::PageParser;
use crate::crawler::task::{AuthRequest, ContentRecord, Failure, FailureKind, FetchRequest};
use crate::pool::Egress;
use crate::ConfigResult;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// A successfully fetched item page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Content(ContentRecord),

    /// The item has no hash, or does not exist
    NoHash,
}

/// Errors raised while talking to the catalog
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("request timeout exception: {0}")]
    Timeout(String),

    #[error("request exception: {0}")]
    Request(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Which resource this failure is charged to
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotLoggedIn | Self::LoginRejected(_) => FailureKind::Auth,
            Self::Timeout(_) | Self::Request(_) | Self::Status(_) => FailureKind::Transport,
            Self::Client(_) => FailureKind::Other,
        }
    }

    pub fn to_failure(&self) -> Failure {
        Failure::new(self.kind(), self.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else {
            Self::Request(error.to_string())
        }
    }
}

/// Access to the catalog, shared by all workers
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Logs in and returns the session cookie value
    async fn authenticate(&self, request: &AuthRequest) -> Result<String, FetchError>;

    /// Fetches and parses one item page
    async fn fetch(&self, request: &FetchRequest) -> Result<Page, FetchError>;
}

/// Fetcher backed by reqwest
#[derive(Debug)]
pub struct HttpFetcher {
    site: SiteEndpoints,
    parser: PageParser,
    clients: Mutex<HashMap<Egress, Client>>,
}

impl HttpFetcher {
    /// Builds a fetcher for the configured site
    ///
    /// # Arguments
    ///
    /// * `config` - The validated site configuration
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Selectors compiled, ready to fetch
    /// * `Err(ConfigError)` - A selector failed to compile
    pub fn new(config: &SiteConfig) -> ConfigResult<Self> {
        Ok(Self {
            parser: PageParser::new(&config.site.hash_selector, &config.site.title_selector)?,
            site: config.site.clone(),
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the client for `egress`, building it on first use
    fn client_for(&self, egress: &Egress) -> Result<Client, FetchError> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(egress) {
            return Ok(client.clone());
        }

        let client = build_http_client(egress, self.site.request_timeout())
            .map_err(|e| FetchError::Client(e.to_string()))?;
        clients.insert(egress.clone(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn authenticate(&self, request: &AuthRequest) -> Result<String, FetchError> {
        let client = self.client_for(&request.egress)?;
        let form = [
            (self.site.username_field.as_str(), request.username.as_str()),
            (self.site.password_field.as_str(), request.password.as_str()),
        ];

        let response = client.post(&self.site.login_url).form(&form).send().await?;
        let status = response.status();

        if let Some(cookie) = session_cookie(response.headers(), &self.site.session_cookie) {
            return Ok(cookie);
        }

        if !status.is_success() && !status.is_redirection() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Err(FetchError::LoginRejected(format!(
            "HTTP {} without a {} cookie",
            status.as_u16(),
            self.site.session_cookie
        )))
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Page, FetchError> {
        let client = self.client_for(&request.egress)?;

        let mut builder = client.get(self.site.item_url_for(request.id)).header(
            COOKIE,
            format!("{}={}", self.site.session_cookie, request.session.cookie),
        );
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();

        // Sessions the site no longer accepts are bounced to the login page
        if status.is_redirection() {
            return Err(FetchError::NotLoggedIn);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(Page::NoHash);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if !self.site.logged_out_marker.is_empty() && body.contains(&self.site.logged_out_marker)
        {
            return Err(FetchError::NotLoggedIn);
        }

        Ok(self
            .parser
            .parse(request.id, &body)
            .map_or(Page::NoHash, Page::Content))
    }
}

/// Builds an HTTP client for one egress route
///
/// Redirects are not followed so that a bounce to the login page is visible
/// to the caller. Proxies are SOCKS5 with remote DNS resolution.
///
/// # Arguments
///
/// * `egress` - Direct, or the proxy to route through
/// * `timeout` - Total request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(egress: &Egress, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = egress.proxy() {
        builder = builder.proxy(reqwest::Proxy::all(format!("socks5h://{}", proxy))?);
    }

    builder.build()
}

/// Finds the value of cookie `name` among the Set-Cookie headers
fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| key.trim() == name && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}
