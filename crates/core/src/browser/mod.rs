//! Browsing capability.
//!
//! The login and search flows never talk HTTP themselves; they drive a
//! [`Browser`], which owns one session (cookies, current page). Each
//! operation gets its own browser, so sessions are never shared.

mod form;
mod http;

pub use form::{Form, FormMethod};
pub use http::HttpBrowser;

use std::borrow::Cow;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use scraper::Html;
use thiserror::Error;
use url::Url;

/// Errors that can occur while navigating.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Connection to {url} failed: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("No page has been loaded")]
    NoPage,

    #[error("No form matches {0:?}")]
    FormNotFound(String),

    #[error("Form has no field named {0:?}")]
    FieldNotFound(String),

    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// The response a browser is currently looking at.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Page {
    pub fn new(url: Url, status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            url,
            status,
            headers,
            body,
        }
    }

    /// Convenience constructor for an HTML page served with status 200.
    pub fn html(url: Url, body: impl Into<String>) -> Self {
        Self::new(url, 200, HeaderMap::new(), body.into().into_bytes())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Parse the body as an HTML document.
    ///
    /// The returned tree is not `Send`; parse it inside synchronous code and
    /// drop it before the next await point.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.text())
    }
}

/// A stateful browsing session.
#[async_trait]
pub trait Browser: Send {
    /// The page loaded by the last successful request.
    fn page(&self) -> Option<&Page>;

    fn url(&self) -> Option<&Url> {
        self.page().map(|p| &p.url)
    }

    fn status_code(&self) -> Option<u16> {
        self.page().map(|p| p.status)
    }

    /// Navigate to `url` with a GET request.
    async fn open(&mut self, url: &Url) -> Result<(), BrowserError>;

    /// GET `url` with `params` appended as its query string.
    async fn open_form(&mut self, url: &Url, params: &[(String, String)])
        -> Result<(), BrowserError>;

    /// Submit a form previously read from the current page.
    async fn submit(&mut self, form: &Form) -> Result<(), BrowserError>;
}

/// Append `params` to `url`'s query, keeping any pairs already present.
pub fn with_query(url: &Url, params: &[(String, String)]) -> Url {
    let mut target = url.clone();
    if params.is_empty() {
        return target;
    }

    let encoded = encode_pairs(params);
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
        _ => encoded,
    };
    target.set_query(Some(&query));
    target
}

/// `application/x-www-form-urlencoded` serialization of `params`.
pub fn encode_pairs(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
