use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration for one harvest run
#[derive(Debug, Clone)]
pub struct Config {
    /// Options given on the command line
    pub run: RunOptions,

    /// Site description loaded from the TOML file
    pub site: SiteConfig,
}

/// Where the ids to crawl come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSource {
    /// Half-open range `[start, end)`
    Range { start: u64, end: u64 },

    /// A file with one id per line
    File(PathBuf),
}

/// Per-run options, normally parsed from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Ids to crawl
    pub ids: IdSource,

    /// Output artifact locations
    pub output: OutputConfig,

    /// File of known ids; lower ids missing from it are skipped
    pub ignore_ids: Option<PathBuf>,

    /// File of `username password` lines
    pub login_file: PathBuf,

    /// Single account given explicitly, overrides the login file
    pub login: Option<AccountConfig>,

    /// Connect directly instead of through proxies
    pub no_proxy: bool,

    /// File of `ip port` lines
    pub proxy_file: PathBuf,

    /// Port of the local proxy used when no proxy file exists
    pub default_proxy_port: u16,

    /// Load inputs, report, and exit without network work
    pub print_only: bool,

    /// Admission queue size; zero means derived from the worker count
    pub queue_size: usize,

    /// Shuffle the backlog before crawling
    pub shuffle: bool,

    /// Skip ids already present in the finished log
    pub resume: bool,

    /// Number of workers
    pub workers: usize,
}

impl RunOptions {
    /// Admission queue size actually used
    ///
    /// Defaults to `min(workers + 2, 30)` when not set explicitly.
    pub fn effective_queue_size(&self) -> usize {
        if self.queue_size > 0 {
            self.queue_size
        } else {
            (self.workers + 2).min(30)
        }
    }
}

/// Output artifact locations
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Root folder of the sharded content files
    pub folder: PathBuf,

    /// Append-only log of finished ids
    pub finished_path: PathBuf,

    /// Append-only log of table lines
    pub table_path: PathBuf,

    /// JSON snapshot of credentials and their session cookies
    pub cookies_path: PathBuf,
}

/// A catalog account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
}

/// Site description loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// User agents picked at random per fetch
    #[serde(rename = "user-agents", default)]
    pub user_agents: Vec<String>,

    pub site: SiteEndpoints,

    /// Extra request headers sent with every fetch
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Fallback account used when no login file or explicit user is given
    #[serde(default)]
    pub account: Option<AccountConfig>,

    #[serde(default)]
    pub timing: TimingConfig,
}

/// How to log in to the catalog and read an item page
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEndpoints {
    /// Form endpoint accepting username and password
    #[serde(rename = "login-url")]
    pub login_url: String,

    /// Item page URL; `{id}` is replaced with the catalog id
    #[serde(rename = "item-url")]
    pub item_url: String,

    #[serde(rename = "username-field", default = "default_username_field")]
    pub username_field: String,

    #[serde(rename = "password-field", default = "default_password_field")]
    pub password_field: String,

    /// Name of the cookie carrying the session token
    #[serde(rename = "session-cookie")]
    pub session_cookie: String,

    /// CSS selector of the element holding the item hash
    #[serde(rename = "hash-selector")]
    pub hash_selector: String,

    /// CSS selector of the item title
    #[serde(rename = "title-selector", default = "default_title_selector")]
    pub title_selector: String,

    /// Text present on pages served to logged-out visitors
    #[serde(rename = "logged-out-marker")]
    pub logged_out_marker: String,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl SiteEndpoints {
    /// Item page URL for `id`
    pub fn item_url_for(&self, id: u64) -> String {
        self.item_url.replace("{id}", &id.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Control loop and worker timing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// Courtesy delay before every fetch (milliseconds)
    #[serde(rename = "fetch-delay-ms", default = "default_fetch_delay")]
    pub fetch_delay_ms: u64,

    /// Interval between progress reports (seconds)
    #[serde(rename = "report-interval-secs", default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// Sleep taken when both channels are empty (milliseconds)
    #[serde(rename = "idle-sleep-ms", default = "default_idle_sleep")]
    pub idle_sleep_ms: u64,

    /// Consecutive idle passes tolerated before stopping
    #[serde(rename = "idle-limit", default = "default_idle_limit")]
    pub idle_limit: u32,

    /// Bounded wait for one result (milliseconds)
    #[serde(rename = "result-wait-ms", default = "default_result_wait")]
    pub result_wait_ms: u64,

    /// Minimum spacing of "no free resource" notices (seconds)
    #[serde(rename = "notice-interval-secs", default = "default_notice_interval")]
    pub notice_interval_secs: u64,
}

impl TimingConfig {
    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn result_wait(&self) -> Duration {
        Duration::from_millis(self.result_wait_ms)
    }

    pub fn notice_interval(&self) -> Duration {
        Duration::from_secs(self.notice_interval_secs)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fetch_delay_ms: default_fetch_delay(),
            report_interval_secs: default_report_interval(),
            idle_sleep_ms: default_idle_sleep(),
            idle_limit: default_idle_limit(),
            result_wait_ms: default_result_wait(),
            notice_interval_secs: default_notice_interval(),
        }
    }
}

fn default_username_field() -> String {
    "username".to_string()
}

fn default_password_field() -> String {
    "password".to_string()
}

fn default_title_selector() -> String {
    "title".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_fetch_delay() -> u64 {
    3000
}

fn default_report_interval() -> u64 {
    10
}

fn default_idle_sleep() -> u64 {
    1000
}

fn default_idle_limit() -> u32 {
    5
}

fn default_result_wait() -> u64 {
    1000
}

fn default_notice_interval() -> u64 {
    60
}
