//! End-to-end runs of the coordinator against a scripted fetcher

use async_trait::async_trait;
use catalog_harvest::config::{
    parse_site_config, AccountConfig, Config, IdSource, OutputConfig, RunOptions,
};
use catalog_harvest::crawler::{
    AuthRequest, ContentRecord, FetchError, FetchRequest, Fetcher, Page,
};
use catalog_harvest::pool::{Credential, Proxy};
use catalog_harvest::storage::{content_path, CredentialStore};
use catalog_harvest::{Coordinator, RunOutcome};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const SITE: &str = r#"
[site]
login-url = "http://catalog.test/login"
item-url = "http://catalog.test/item/{id}"
session-cookie = "sid"
hash-selector = "span.hash"
logged-out-marker = "Please sign in"

[timing]
fetch-delay-ms = 0
report-interval-secs = 1
idle-sleep-ms = 10
idle-limit = 5
result-wait-ms = 20
"#;

/// What the scripted fetcher does for one fetch of an id
enum Step {
    Content,
    NoHash,
    Fail(FetchError),
    Panic,
}

/// Fetcher that replays a per-id script; unscripted fetches succeed
#[derive(Default)]
struct ScriptedFetcher {
    steps: Mutex<HashMap<u64, VecDeque<Step>>>,
    fetches: Mutex<Vec<(u64, String)>>,
    logins: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn script(self, id: u64, steps: Vec<Step>) -> Self {
        self.steps.lock().unwrap().insert(id, steps.into());
        self
    }

    fn fetch_count(&self, id: u64) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|(fetched, _)| *fetched == id)
            .count()
    }

    fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    fn cookies_used(&self) -> Vec<String> {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cookie)| cookie.clone())
            .collect()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn authenticate(&self, request: &AuthRequest) -> Result<String, FetchError> {
        self.logins.lock().unwrap().push(request.username.clone());
        Ok(format!("tok-{}", request.username))
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Page, FetchError> {
        self.fetches
            .lock()
            .unwrap()
            .push((request.id, request.session.cookie.clone()));

        let step = self
            .steps
            .lock()
            .unwrap()
            .get_mut(&request.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Content);

        match step {
            Step::Content => Ok(Page::Content(ContentRecord {
                id: request.id,
                line: format!("{}\tH{}\tItem {}", request.id, request.id, request.id),
                text: format!("<html>{}</html>", request.id),
            })),
            Step::NoHash => Ok(Page::NoHash),
            Step::Fail(error) => Err(error),
            Step::Panic => panic!("request timeout exception while parsing"),
        }
    }
}

/// Creates a run configuration with every artifact inside `dir`
///
/// One proxy from a proxy file and one explicit account without a cookie.
fn create_test_config(dir: &TempDir, start: u64, end: u64) -> Config {
    let proxy_file = dir.path().join("proxy.txt");
    fs::write(&proxy_file, "127.0.0.1 9150\n").unwrap();

    Config {
        run: RunOptions {
            ids: IdSource::Range { start, end },
            output: OutputConfig {
                folder: dir.path().join("descr"),
                finished_path: dir.path().join("finished.txt"),
                table_path: dir.path().join("table.txt"),
                cookies_path: dir.path().join("cookies.json"),
            },
            ignore_ids: None,
            login_file: dir.path().join("login.txt"),
            login: Some(AccountConfig {
                username: "alice".to_string(),
                password: "pw".to_string(),
            }),
            no_proxy: false,
            proxy_file,
            default_proxy_port: 9150,
            print_only: false,
            queue_size: 0,
            shuffle: false,
            resume: false,
            workers: 1,
        },
        site: parse_site_config(SITE).unwrap(),
    }
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_single_item_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 100, 101);
    let output = config.run.output.clone();
    let fetcher = Arc::new(ScriptedFetcher::default());

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.totals.ok, 1);
    assert_eq!(report.summary.auth_ok, 1);
    assert_eq!(report.summary.remaining, 0);

    // The login happened first and its cookie was used for the fetch
    assert_eq!(*fetcher.logins.lock().unwrap(), vec!["alice".to_string()]);
    assert_eq!(fetcher.cookies_used(), vec!["tok-alice".to_string()]);

    let saved = CredentialStore::new(&output.cookies_path).load().unwrap();
    assert_eq!(saved[0].cookie.as_deref(), Some("tok-alice"));

    assert_eq!(read_lines(&output.finished_path), vec!["100"]);
    assert_eq!(read_lines(&output.table_path), vec!["100\tH100\tItem 100"]);

    let content = content_path(&output.folder, 100);
    assert!(content.ends_with("000/00000100"));
    assert_eq!(fs::read_to_string(content).unwrap(), "<html>100</html>");

    let state = coordinator.state();
    let proxy = state.proxies.get(&Proxy::new("127.0.0.1", 9150)).unwrap();
    assert_eq!(proxy.in_use, 0);
    assert_eq!(state.credentials.get("alice").unwrap().in_use, 0);
    assert!(state.backlog.is_empty());
}

#[tokio::test]
async fn test_transport_error_is_retried() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 7, 8);
    let output = config.run.output.clone();
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .script(7, vec![Step::Fail(FetchError::Timeout("deadline".into()))]),
    );

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(fetcher.fetch_count(7), 2);
    assert_eq!(report.summary.totals.error, 1);
    assert_eq!(report.summary.totals.ok, 1);
    assert_eq!(read_lines(&output.finished_path), vec!["7"]);

    let state = coordinator.state();
    let proxy = state.proxies.get(&Proxy::new("127.0.0.1", 9150)).unwrap();
    assert_eq!(proxy.fail_count, 1);
    assert_eq!(state.credentials.get("alice").unwrap().fail_count, 0);
}

#[tokio::test]
async fn test_panicking_fetch_requeues_id() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 3, 4);
    let output = config.run.output.clone();
    let fetcher = Arc::new(ScriptedFetcher::default().script(3, vec![Step::Panic]));

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(fetcher.fetch_count(3), 2);
    assert_eq!(read_lines(&output.finished_path), vec!["3"]);

    // The panic text named a timeout, so the proxy was charged
    let proxy = coordinator
        .state()
        .proxies
        .get(&Proxy::new("127.0.0.1", 9150))
        .unwrap();
    assert_eq!(proxy.fail_count, 1);
}

#[tokio::test]
async fn test_no_hash_is_terminal() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 5, 6);
    let output = config.run.output.clone();
    let fetcher = Arc::new(ScriptedFetcher::default().script(5, vec![Step::NoHash]));

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.totals.no_hash, 1);
    assert_eq!(fetcher.fetch_count(5), 1);
    assert_eq!(read_lines(&output.finished_path), vec!["5"]);
    assert!(read_lines(&output.table_path).is_empty());
    assert!(!content_path(&output.folder, 5).exists());
}

#[tokio::test]
async fn test_rejected_session_invalidates_credential() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 1, 2);
    let output = config.run.output.clone();

    // A saved session is restored, so no login is needed
    let store = CredentialStore::new(&output.cookies_path);
    let mut saved = Credential::new("alice", "pw");
    saved.cookie = Some("old".to_string());
    store.save(&[saved]).unwrap();

    let fetcher = Arc::new(ScriptedFetcher::default().script(
        1,
        (0..10).map(|_| Step::Fail(FetchError::NotLoggedIn)).collect(),
    ));

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert!(fetcher.logins.lock().unwrap().is_empty());
    assert!(fetcher.cookies_used().iter().all(|cookie| cookie == "old"));

    // The sixth rejection clears the cookie; nothing can be leased after that
    assert_eq!(fetcher.fetch_count(1), 6);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.remaining, 1);
    assert!(coordinator.state().backlog.contains(1));

    assert_eq!(store.load().unwrap()[0].cookie, None);
    assert!(read_lines(&output.finished_path).is_empty());
}

#[tokio::test]
async fn test_resume_skips_finished_ids() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, 1, 4);
    config.run.resume = true;
    let output = config.run.output.clone();
    fs::write(&output.finished_path, "1\n2\n").unwrap();
    let fetcher = Arc::new(ScriptedFetcher::default());

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    coordinator.run().await.unwrap();

    assert_eq!(fetcher.total_fetches(), 1);
    assert_eq!(fetcher.fetch_count(3), 1);
    assert_eq!(read_lines(&output.finished_path), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_direct_mode_with_login_file() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, 0, 20);
    config.run.no_proxy = true;
    config.run.login = None;
    config.run.workers = 3;
    fs::write(&config.run.login_file, "alice pw\nbob pw\n").unwrap();
    let output = config.run.output.clone();
    let fetcher = Arc::new(ScriptedFetcher::default());

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.totals.ok, 20);
    assert_eq!(report.summary.auth_ok, 2);

    let mut finished: Vec<u64> = read_lines(&output.finished_path)
        .iter()
        .map(|line| line.parse().unwrap())
        .collect();
    finished.sort_unstable();
    assert_eq!(finished, (0..20).collect::<Vec<_>>());

    // Each id fetched exactly once
    assert_eq!(fetcher.total_fetches(), 20);
}

#[tokio::test]
async fn test_empty_input_terminates() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, 5, 5);
    let fetcher = Arc::new(ScriptedFetcher::default());

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::EmptyInput);
    assert!(fetcher.logins.lock().unwrap().is_empty());
    assert_eq!(fetcher.total_fetches(), 0);
}

#[tokio::test]
async fn test_print_only_fetches_nothing() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, 1, 10);
    config.run.print_only = true;
    let fetcher = Arc::new(ScriptedFetcher::default());

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::PrintOnly);
    assert_eq!(report.summary.remaining, 9);
    assert_eq!(fetcher.total_fetches(), 0);
}

#[tokio::test]
async fn test_interrupt_stops_run() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, 1, 3);
    config.site.timing.fetch_delay_ms = 60_000;
    let output = config.run.output.clone();
    let fetcher = Arc::new(ScriptedFetcher::default());
    let cancel = CancellationToken::new();

    let mut coordinator = Coordinator::new(config, fetcher.clone(), cancel.clone()).unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(fetcher.total_fetches(), 0);
    assert!(read_lines(&output.finished_path).is_empty());
}

#[tokio::test]
async fn test_no_workers_ends_as_workers_lost() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, 1, 3);
    config.run.workers = 0;
    let output = config.run.output.clone();
    let fetcher = Arc::new(ScriptedFetcher::default());

    let mut coordinator =
        Coordinator::new(config, fetcher.clone(), CancellationToken::new()).unwrap();
    let report = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::WorkersLost);
    assert!(fetcher.logins.lock().unwrap().is_empty());
    assert_eq!(fetcher.total_fetches(), 0);
    assert_eq!(report.summary.remaining, 2);
    assert!(read_lines(&output.finished_path).is_empty());
}
