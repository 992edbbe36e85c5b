//! HttpFetcher against mock catalog servers

use catalog_harvest::config::parse_site_config;
use catalog_harvest::crawler::{
    AuthRequest, FailureKind, FetchError, FetchRequest, Fetcher, HttpFetcher, Page,
};
use catalog_harvest::pool::{Egress, Session};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ITEM_PAGE: &str = r#"<html>
<head><title>Item 42</title></head>
<body><span class="hash">ABCDEF</span></body>
</html>"#;

/// Creates a fetcher pointed at the mock server
fn create_test_fetcher(server: &MockServer) -> HttpFetcher {
    let site = parse_site_config(&format!(
        r#"
[site]
login-url = "{base}/login"
item-url = "{base}/item/{{id}}"
session-cookie = "sid"
hash-selector = "span.hash"
logged-out-marker = "Please sign in"
request-timeout-secs = 5
"#,
        base = server.uri()
    ))
    .unwrap();

    HttpFetcher::new(&site).unwrap()
}

fn login(username: &str) -> AuthRequest {
    AuthRequest {
        username: username.to_string(),
        password: "pw".to_string(),
        egress: Egress::Direct,
    }
}

fn item(id: u64) -> FetchRequest {
    FetchRequest {
        id,
        session: Session {
            username: "alice".to_string(),
            cookie: "tok".to_string(),
        },
        egress: Egress::Direct,
        headers: vec![("X-Harvest".to_string(), "1".to_string())],
    }
}

#[tokio::test]
async fn test_login_extracts_session_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=pw"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/")
                .insert_header("Set-Cookie", "sid=abc123; Path=/; HttpOnly"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher(&server);
    let cookie = fetcher.authenticate(&login("alice")).await.unwrap();

    assert_eq!(cookie, "abc123");
}

#[tokio::test]
async fn test_login_without_cookie_is_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Wrong password"))
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher(&server);
    let error = fetcher.authenticate(&login("alice")).await.unwrap_err();

    assert!(matches!(error, FetchError::LoginRejected(_)));
    assert_eq!(error.kind(), FailureKind::Auth);
}

#[tokio::test]
async fn test_fetch_parses_item() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/item/42"))
        .and(header("cookie", "sid=tok"))
        .and(header("x-harvest", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ITEM_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher(&server);
    let page = fetcher.fetch(&item(42)).await.unwrap();

    let record = match page {
        Page::Content(record) => record,
        other => panic!("expected item content, got {:?}", other),
    };
    assert_eq!(record.id, 42);
    assert_eq!(record.line, "42\tABCDEF\tItem 42");
    assert_eq!(record.text, ITEM_PAGE);
}

#[tokio::test]
async fn test_missing_hash_is_no_hash() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/item/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>Removed</body></html>"),
        )
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher(&server);

    assert_eq!(fetcher.fetch(&item(7)).await.unwrap(), Page::NoHash);
}

#[tokio::test]
async fn test_missing_item_is_no_hash() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/item/8"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher(&server);

    assert_eq!(fetcher.fetch(&item(8)).await.unwrap(), Page::NoHash);
}

#[tokio::test]
async fn test_logged_out_page_is_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/item/9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Please sign in to continue</body></html>"),
        )
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher(&server);
    let error = fetcher.fetch(&item(9)).await.unwrap_err();

    assert!(matches!(error, FetchError::NotLoggedIn));
    assert_eq!(error.to_failure().kind, FailureKind::Auth);
}

#[tokio::test]
async fn test_redirect_to_login_is_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/item/10"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/login"))
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher(&server);

    assert!(matches!(
        fetcher.fetch(&item(10)).await,
        Err(FetchError::NotLoggedIn)
    ));
}

#[tokio::test]
async fn test_server_error_is_transport_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/item/11"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = create_test_fetcher(&server);
    let error = fetcher.fetch(&item(11)).await.unwrap_err();

    assert!(matches!(error, FetchError::Status(503)));
    assert_eq!(error.kind(), FailureKind::Transport);
}

#[tokio::test]
async fn test_unreachable_host_is_transport_failure() {
    let site = parse_site_config(
        r#"
[site]
login-url = "http://127.0.0.1:1/login"
item-url = "http://127.0.0.1:1/item/{id}"
session-cookie = "sid"
hash-selector = "span.hash"
logged-out-marker = "Please sign in"
request-timeout-secs = 5
"#,
    )
    .unwrap();
    let fetcher = HttpFetcher::new(&site).unwrap();

    let error = fetcher.fetch(&item(12)).await.unwrap_err();

    assert!(matches!(error, FetchError::Request(_) | FetchError::Timeout(_)));
    assert_eq!(error.kind(), FailureKind::Transport);
}
