//! Login and download integration tests.
//!
//! These tests verify the login state machine against a mock browser:
//! - Form filling from the site's configuration section
//! - Error rules on the post-login page
//! - Downloads always logging in first

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use trawler_core::{
    testing::{fixtures, MockBrowser, RequestKind},
    BrowserError, FormMethod, IndexerError, LoginFlow, LoginState, MemoryConfig, Page, Runner,
};
use url::Url;

fn credentials() -> MemoryConfig {
    MemoryConfig::new().with_section(
        fixtures::SITE,
        [("username", "alice"), ("password", "hunter2")],
    )
}

fn runner(config: MemoryConfig) -> Runner {
    Runner::new(Arc::new(fixtures::private_definition()), Arc::new(config))
}

#[tokio::test]
async fn test_login_submits_filled_form() {
    let runner = runner(credentials());
    let mut browser = fixtures::tracker_browser("");

    runner.login(&mut browser).await.unwrap();

    let requests = browser.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url.as_str(), fixtures::LOGIN_URL);

    let submit = &requests[1];
    assert_eq!(submit.kind, RequestKind::Submit(FormMethod::Post));
    assert_eq!(submit.url.as_str(), fixtures::TAKELOGIN_URL);
    assert_eq!(submit.param("username"), vec!["alice"]);
    assert_eq!(submit.param("password"), vec!["hunter2"]);
    assert_eq!(submit.param("returnto"), vec!["/"]);
}

#[tokio::test]
async fn test_login_flow_reaches_logged_in() {
    let runner = runner(credentials());
    let login = runner.definition().login.clone().unwrap();
    let mut browser = fixtures::tracker_browser("");

    let mut flow = LoginFlow::new(&runner, &login);
    assert_eq!(flow.state(), LoginState::Start);

    flow.run(&mut browser).await.unwrap();
    assert_eq!(flow.state(), LoginState::LoggedIn);
}

#[tokio::test]
async fn test_login_error_rule_fails() {
    let runner = runner(credentials());
    let login = runner.definition().login.clone().unwrap();
    let mut browser = MockBrowser::new()
        .with_page(fixtures::LOGIN_URL, fixtures::LOGIN_PAGE)
        .with_page(fixtures::TAKELOGIN_URL, fixtures::LOGIN_FAILED_PAGE);

    let mut flow = LoginFlow::new(&runner, &login);
    let err = flow.run(&mut browser).await.unwrap_err();

    assert_eq!(flow.state(), LoginState::Failed);
    match err {
        IndexerError::Login(reason) => assert_eq!(reason, "Username or password incorrect"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_login_missing_credentials_is_template_error() {
    let runner = runner(MemoryConfig::new());
    let mut browser = fixtures::tracker_browser("");

    let err = runner.login(&mut browser).await.unwrap_err();

    assert!(matches!(err, IndexerError::Template(_)));
    // the form is never submitted
    assert_eq!(browser.requests().len(), 1);
}

#[tokio::test]
async fn test_login_navigation_failure_is_fatal() {
    let runner = runner(credentials());
    let mut browser = fixtures::tracker_browser("");
    browser.fail_next(BrowserError::ConnectionFailed {
        url: fixtures::LOGIN_URL.to_string(),
        reason: "refused".to_string(),
    });

    let err = runner.login(&mut browser).await.unwrap_err();
    assert!(matches!(err, IndexerError::Transport(_)));
}

#[tokio::test]
async fn test_login_form_missing() {
    let runner = runner(credentials());
    let mut browser = MockBrowser::new().with_page(fixtures::LOGIN_URL, "<p>maintenance</p>");

    let err = runner.login(&mut browser).await.unwrap_err();
    assert!(matches!(
        err,
        IndexerError::Transport(BrowserError::FormNotFound(_))
    ));
}

#[tokio::test]
async fn test_download_logs_in_every_time() {
    let runner = runner(credentials());

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-bittorrent"));
    let torrent = Page::new(
        Url::parse("https://tracker.example/download.php?id=1").unwrap(),
        200,
        headers,
        b"d8:announce...e".to_vec(),
    );
    let mut browser = fixtures::tracker_browser("").with_response(torrent);

    let first = runner
        .download(&mut browser, "/download.php?id=1")
        .await
        .unwrap();
    assert_eq!(first.bytes, b"d8:announce...e");
    assert_eq!(
        first.headers.get(CONTENT_TYPE).unwrap(),
        "application/x-bittorrent"
    );

    runner
        .download(&mut browser, "/download.php?id=1")
        .await
        .unwrap();

    let logins = browser
        .requests()
        .iter()
        .filter(|r| matches!(r.kind, RequestKind::Submit(_)))
        .count();
    assert_eq!(logins, 2);
}

#[tokio::test]
async fn test_public_site_skips_login() {
    let mut definition = fixtures::private_definition();
    definition.login = None;
    let runner = Runner::new(Arc::new(definition), Arc::new(MemoryConfig::new()));
    let mut browser = MockBrowser::new();

    runner.login(&mut browser).await.unwrap();
    assert!(browser.requests().is_empty());
}
