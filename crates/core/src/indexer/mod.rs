//! Running a definition against a browsing session.
//!
//! A [`Runner`] pairs one site [`Definition`] with the configuration store.
//! Every operation takes the [`Browser`] to drive as an argument, so a
//! runner can be shared while each operation keeps its own session.

mod login;
mod search;

pub use login::{LoginFlow, LoginState};

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::browser::{Browser, BrowserError};
use crate::category::{TV, TV_HD, TV_SD};
use crate::config::ConfigStore;
use crate::definition::{Capabilities, Definition};
use crate::error::IndexerError;
use crate::filter::FilterContext;
use crate::query::Query;
use crate::result::ResultItem;

/// Results requested per search mode by [`Runner::test`].
const TEST_LIMIT: usize = 5;

/// Site description for protocol clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub language: String,
}

/// A downloaded file.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub headers: HeaderMap,
}

pub struct Runner {
    definition: Arc<Definition>,
    config: Arc<dyn ConfigStore>,
}

impl Runner {
    pub fn new(definition: Arc<Definition>, config: Arc<dyn ConfigStore>) -> Self {
        Self { definition, config }
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn site(&self) -> &str {
        &self.definition.site
    }

    pub fn info(&self) -> Info {
        Info {
            id: self.definition.site.clone(),
            title: self.definition.name.clone(),
            description: self.definition.description.clone(),
            language: self.definition.language.clone(),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.definition.capabilities
    }

    /// A filter context for one operation against this site.
    fn filter_context(&self) -> FilterContext<'_> {
        FilterContext::new(&self.definition.site, &self.definition.capabilities.categories)
    }

    /// The URL relative paths resolve against: the page the browser is on,
    /// else the site's configured `url`, else the definition's first link.
    pub fn current_url(&self, browser: &dyn Browser) -> Result<Url, IndexerError> {
        if let Some(url) = browser.url() {
            return Ok(url.clone());
        }

        if let Some(configured) = self.config.get(&self.definition.site, "url")? {
            return Url::parse(&configured).map_err(|e| IndexerError::InvalidUrl {
                url: configured.clone(),
                reason: e.to_string(),
            });
        }

        Ok(self.definition.base_url()?)
    }

    /// Resolve `path` against [`Runner::current_url`].
    pub fn resolve_path(&self, browser: &dyn Browser, path: &str) -> Result<Url, IndexerError> {
        let base = self.current_url(browser)?;
        let resolved = base.join(path).map_err(|e| IndexerError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })?;

        debug!(site = %self.definition.site, base = %base, url = %resolved, "Resolved url");
        Ok(resolved)
    }

    async fn open_page(&self, browser: &mut dyn Browser, url: &Url) -> Result<(), IndexerError> {
        debug!(site = %self.definition.site, url = %url, "Attempting to open page");
        browser.open(url).await?;
        debug!(
            site = %self.definition.site,
            code = ?browser.status_code(),
            page = ?browser.url().map(Url::as_str),
            "Finished request"
        );
        Ok(())
    }

    /// Log in, if the site declares a login block.
    pub async fn login(&self, browser: &mut dyn Browser) -> Result<(), IndexerError> {
        let Some(login) = &self.definition.login else {
            debug!(site = %self.definition.site, "Site declares no login, skipping");
            return Ok(());
        };

        LoginFlow::new(self, login).run(browser).await
    }

    /// Log in and fetch `link` (absolute or relative to the site).
    ///
    /// The login is repeated on every call; sessions are not reused.
    pub async fn download(
        &self,
        browser: &mut dyn Browser,
        link: &str,
    ) -> Result<Download, IndexerError> {
        self.login(browser).await?;

        let url = self.resolve_path(browser, link)?;
        info!(site = %self.definition.site, url = %url, "Downloading");
        browser.open(&url).await?;

        let page = browser.page().ok_or(BrowserError::NoPage)?;
        Ok(Download {
            bytes: page.body.clone(),
            headers: page.headers.clone(),
        })
    }

    /// Run a small search in every declared mode and check the results look
    /// complete.
    pub async fn test(&self, browser: &mut dyn Browser) -> Result<(), IndexerError> {
        for mode in &self.definition.capabilities.search_modes {
            let mut query = Query::new(mode.key.as_str()).with_limit(TEST_LIMIT);
            if mode.key == "tv-search" {
                query = query.with_categories(vec![TV, TV_HD, TV_SD]);
            }

            info!(site = %self.definition.site, mode = %mode.key, "Testing search mode");
            let results = self.search(browser, &query).await?;
            if results.is_empty() {
                return Err(IndexerError::NoResults);
            }
            check_results(&results)?;
        }

        Ok(())
    }
}

fn check_results(results: &[ResultItem]) -> Result<(), IndexerError> {
    for (idx, item) in results.iter().enumerate() {
        let row = idx + 1;
        let problem = if item.title.is_empty() {
            "empty title"
        } else if item.size == 0 {
            "zero size"
        } else if item.link.is_empty() {
            "blank link"
        } else if item.site.is_empty() {
            "blank site"
        } else if item.category == 0 {
            "blank category"
        } else {
            continue;
        };
        return Err(IndexerError::Test(format!("Result row {row} has {problem}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::testing::{fixtures, MockBrowser};

    fn runner(config: MemoryConfig) -> Runner {
        Runner::new(Arc::new(fixtures::private_definition()), Arc::new(config))
    }

    #[test]
    fn test_info() {
        let info = runner(MemoryConfig::new()).info();
        assert_eq!(info.id, fixtures::SITE);
        assert_eq!(info.title, "Example Tracker");
        assert_eq!(info.description, "A private example tracker");
        assert_eq!(info.language, "en-us");
    }

    #[test]
    fn test_current_url_falls_back_to_first_link() {
        let runner = runner(MemoryConfig::new());
        let browser = MockBrowser::new();
        assert_eq!(
            runner.current_url(&browser).unwrap().as_str(),
            fixtures::BASE_URL
        );
    }

    #[test]
    fn test_current_url_prefers_configured_url() {
        let config =
            MemoryConfig::new().with_section(fixtures::SITE, [("url", "https://mirror.example/")]);
        let runner = runner(config);
        let browser = MockBrowser::new();

        let resolved = runner.resolve_path(&browser, "/browse.php").unwrap();
        assert_eq!(resolved.as_str(), "https://mirror.example/browse.php");
    }

    #[test]
    fn test_current_url_bad_configured_url() {
        let config = MemoryConfig::new().with_section(fixtures::SITE, [("url", "::nope")]);
        let runner = runner(config);
        let browser = MockBrowser::new();

        assert!(matches!(
            runner.current_url(&browser),
            Err(IndexerError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_current_url_prefers_browser_page() {
        let runner = runner(MemoryConfig::new());
        let mut browser = MockBrowser::new().with_page("https://other.example/x/", "<p></p>");
        browser
            .open(&Url::parse("https://other.example/x/").unwrap())
            .await
            .unwrap();

        let resolved = runner.resolve_path(&browser, "y.php").unwrap();
        assert_eq!(resolved.as_str(), "https://other.example/x/y.php");
    }

    #[test]
    fn test_check_results() {
        let mut item = ResultItem::new("site");
        item.title = "x".to_string();
        item.size = 10;
        item.link = "http://site/dl".to_string();
        item.category = 5040;
        assert!(check_results(&[item.clone()]).is_ok());

        let mut broken = item.clone();
        broken.size = 0;
        let err = check_results(&[item, broken]).unwrap_err();
        assert_eq!(err.to_string(), "Self-test failed: Result row 2 has zero size");
    }
}
