//! Mock browser for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use url::Url;

use crate::browser::{with_query, Browser, BrowserError, Form, FormMethod, Page};

/// How a recorded request was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Open,
    OpenForm,
    Submit(FormMethod),
}

/// A request the mock served, for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub kind: RequestKind,
    /// Target URL without the form parameters.
    pub url: Url,
    /// Form parameters, in submission order.
    pub params: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Every value sent for `key`.
    pub fn param(&self, key: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Mock implementation of the Browser trait.
///
/// Serves canned pages by URL without touching the network:
/// - Pages are matched on the full URL first, then on the URL without query
/// - Unknown URLs get an empty 404 page, like a real server would send
/// - Every request is recorded
/// - The next request can be told to fail
///
/// # Example
///
/// ```rust,ignore
/// use trawler_core::testing::MockBrowser;
///
/// let mut browser = MockBrowser::new()
///     .with_page("https://tracker.example/browse.php", "<table>...</table>");
///
/// runner.search(&mut browser, &query).await?;
/// assert_eq!(browser.requests().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MockBrowser {
    pages: HashMap<String, Page>,
    requests: Vec<RecordedRequest>,
    next_error: Option<BrowserError>,
    current: Option<Page>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` with status 200 for `url`.
    ///
    /// # Panics
    /// When `url` is not a valid absolute URL.
    pub fn with_page(self, url: &str, html: &str) -> Self {
        let parsed = Url::parse(url).expect("mock page url must be absolute");
        self.with_response(Page::html(parsed, html))
    }

    /// Serve a prepared response at its URL.
    pub fn with_response(mut self, page: Page) -> Self {
        self.pages.insert(page.url.to_string(), page);
        self
    }

    /// Fail the next request with `error`.
    pub fn fail_next(&mut self, error: BrowserError) {
        self.next_error = Some(error);
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    pub fn last_request(&self) -> Option<&RecordedRequest> {
        self.requests.last()
    }

    fn lookup(&self, url: &Url) -> Page {
        if let Some(page) = self.pages.get(url.as_str()) {
            return page.clone();
        }

        let mut bare = url.clone();
        bare.set_query(None);
        bare.set_fragment(None);
        match self.pages.get(bare.as_str()) {
            Some(page) => Page {
                url: url.clone(),
                ..page.clone()
            },
            None => Page::new(url.clone(), 404, HeaderMap::new(), Vec::new()),
        }
    }

    fn serve(
        &mut self,
        kind: RequestKind,
        url: &Url,
        params: &[(String, String)],
    ) -> Result<(), BrowserError> {
        self.requests.push(RecordedRequest {
            kind,
            url: url.clone(),
            params: params.to_vec(),
        });

        if let Some(error) = self.next_error.take() {
            return Err(error);
        }

        let target = match kind {
            RequestKind::Submit(FormMethod::Post) => url.clone(),
            _ => with_query(url, params),
        };
        self.current = Some(self.lookup(&target));
        Ok(())
    }
}

#[async_trait]
impl Browser for MockBrowser {
    fn page(&self) -> Option<&Page> {
        self.current.as_ref()
    }

    async fn open(&mut self, url: &Url) -> Result<(), BrowserError> {
        self.serve(RequestKind::Open, url, &[])
    }

    async fn open_form(
        &mut self,
        url: &Url,
        params: &[(String, String)],
    ) -> Result<(), BrowserError> {
        self.serve(RequestKind::OpenForm, url, params)
    }

    async fn submit(&mut self, form: &Form) -> Result<(), BrowserError> {
        self.serve(RequestKind::Submit(form.method), &form.action, form.fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_pages_and_records() {
        let mut browser = MockBrowser::new().with_page("https://site.example/a", "<p>a</p>");
        let url = Url::parse("https://site.example/a").unwrap();

        browser.open(&url).await.unwrap();
        assert_eq!(browser.page().unwrap().text(), "<p>a</p>");
        assert_eq!(browser.status_code(), Some(200));
        assert_eq!(browser.requests().len(), 1);
        assert_eq!(browser.last_request().unwrap().kind, RequestKind::Open);
    }

    #[tokio::test]
    async fn test_query_falls_back_to_bare_url() {
        let mut browser = MockBrowser::new().with_page("https://site.example/s", "results");
        let url = Url::parse("https://site.example/s").unwrap();
        let params = vec![("q".to_string(), "x".to_string())];

        browser.open_form(&url, &params).await.unwrap();
        assert_eq!(browser.page().unwrap().text(), "results");
        assert_eq!(browser.url().unwrap().as_str(), "https://site.example/s?q=x");
        assert_eq!(browser.last_request().unwrap().param("q"), vec!["x"]);
    }

    #[tokio::test]
    async fn test_unknown_url_is_404() {
        let mut browser = MockBrowser::new();
        browser
            .open(&Url::parse("https://site.example/missing").unwrap())
            .await
            .unwrap();
        assert_eq!(browser.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_fail_next() {
        let mut browser = MockBrowser::new();
        browser.fail_next(BrowserError::NoPage);
        let url = Url::parse("https://site.example/").unwrap();

        assert!(browser.open(&url).await.is_err());
        assert!(browser.open(&url).await.is_ok());
    }
}
