//! Testing utilities for running definitions without a network.
//!
//! [`MockBrowser`] stands in for the HTTP browser and [`fixtures`] provides a
//! private-tracker definition with matching login and results pages.
//!
//! # Example
//!
//! ```rust,ignore
//! use trawler_core::testing::{fixtures, MockBrowser};
//!
//! let mut browser = fixtures::tracker_browser(&fixtures::results_page(&[
//!     fixtures::row(1, "Show.S01E01.720p", 7),
//! ]));
//! let items = runner.search(&mut browser, &query).await?;
//! ```

mod mock_browser;

pub use mock_browser::{MockBrowser, RecordedRequest, RequestKind};

/// Test fixtures and helper functions.
pub mod fixtures {
    use super::MockBrowser;
    use crate::definition::Definition;

    pub const SITE: &str = "examplesite";
    pub const BASE_URL: &str = "https://tracker.example/";
    pub const LOGIN_URL: &str = "https://tracker.example/login.php";
    pub const TAKELOGIN_URL: &str = "https://tracker.example/takelogin.php";
    pub const SEARCH_URL: &str = "https://tracker.example/browse.php";

    /// A private tracker: form login, categories 7 (TV) and 12 (Movies/HD).
    pub const PRIVATE_DEFINITION: &str = r#"{
        "site": "examplesite",
        "name": "Example Tracker",
        "description": "A private example tracker",
        "links": ["https://tracker.example/"],
        "login": {
            "path": "/login.php",
            "form_selector": "form#login",
            "inputs": {
                "username": "{{ .Config.username }}",
                "password": "{{ .Config.password }}"
            },
            "error": [
                {"selector": "div.error"}
            ]
        },
        "search": {
            "path": "/browse.php",
            "inputs": {
                "search": "{{ .Query.Keywords }}",
                "$raw": "q={{ .Query.Keywords }}&page=2{{ range .Categories }}&cat[]={{ . }}{{ end }}"
            },
            "rows": {"selector": "table#torrents tr.torrent"},
            "fields": {
                "title": {"selector": "td.name a"},
                "details": {"selector": "td.name a", "attribute": "href"},
                "download": {"selector": "td.dl a", "attribute": "href"},
                "category": {
                    "selector": "td.cat a",
                    "attribute": "href",
                    "filters": [
                        {"name": "querystring", "args": "cat"},
                        {"name": "mapcats"}
                    ]
                },
                "size": {"selector": "td.size"},
                "seeders": {"selector": "td.seeders"},
                "leechers": {"selector": "td.leechers"},
                "date": {
                    "selector": "td.added",
                    "filters": [{"name": "dateparse", "args": "2006-01-02 15:04:05"}]
                }
            }
        },
        "capabilities": {
            "modes": [
                {"key": "search", "supported_params": ["q"]},
                {"key": "tv-search", "supported_params": ["q", "season", "ep"]}
            ],
            "categories": [
                {"id": 7, "cat": "TV/SD"},
                {"id": 7, "cat": "TV/HD"},
                {"id": 12, "cat": "Movies/HD"}
            ]
        }
    }"#;

    pub fn private_definition() -> Definition {
        Definition::from_json(PRIVATE_DEFINITION).expect("fixture definition is valid")
    }

    pub const LOGIN_PAGE: &str = r#"<html><body>
        <form id="login" action="takelogin.php" method="post">
          <input type="hidden" name="returnto" value="/">
          <input type="text" name="username">
          <input type="password" name="password">
          <input type="submit" value="Log in">
        </form>
    </body></html>"#;

    pub const LOGGED_IN_PAGE: &str =
        r#"<html><body><div class="welcome">Welcome back</div></body></html>"#;

    pub const LOGIN_FAILED_PAGE: &str =
        r#"<html><body><div class="error">Username or password incorrect</div></body></html>"#;

    /// One results row. Empty `title` renders an empty link.
    pub fn row(id: u32, title: &str, local_category: i64) -> String {
        format!(
            r#"<tr class="torrent">
                <td class="cat"><a href="/browse.php?cat={local_category}">cat</a></td>
                <td class="name"><a href="/details.php?id={id}">{title}</a></td>
                <td class="dl"><a href="/download.php?id={id}">dl</a></td>
                <td class="size">1.5 GB</td>
                <td class="seeders">{seeders}</td>
                <td class="leechers">2</td>
                <td class="added">2016-03-12 08:05:00</td>
            </tr>"#,
            seeders = id * 10,
        )
    }

    /// A results page wrapping `rows`.
    pub fn results_page(rows: &[String]) -> String {
        format!(
            r#"<html><body><table id="torrents">
                <tr class="header"><th>Name</th></tr>
                {}
            </table></body></html>"#,
            rows.join("\n")
        )
    }

    /// A browser serving the tracker's login pages and `results` at the
    /// search URL.
    pub fn tracker_browser(results: &str) -> MockBrowser {
        MockBrowser::new()
            .with_page(BASE_URL, "<html><body>home</body></html>")
            .with_page(LOGIN_URL, LOGIN_PAGE)
            .with_page(TAKELOGIN_URL, LOGGED_IN_PAGE)
            .with_page(SEARCH_URL, results)
    }
}
