use std::time::Instant;

use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{Browser, BrowserError, Page};
use crate::definition::RAW_INPUT;
use crate::error::IndexerError;
use crate::extract::extract_items;
use crate::metrics;
use crate::query::Query;
use crate::result::ResultItem;
use crate::template::{resolve, TemplateContext};

use super::Runner;

/// Decode a resolved [`RAW_INPUT`] value as a query string.
///
/// Every `%` must start a two-digit hex escape; anything else is rejected
/// rather than passed through literally.
fn parse_raw_input(input: &str) -> Result<Vec<(String, String)>, IndexerError> {
    let bytes = input.as_bytes();
    for (pos, _) in input.match_indices('%') {
        let escape = bytes.get(pos + 1..pos + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            let end = input.len().min(pos + 3);
            return Err(IndexerError::RawInput {
                input: input.to_string(),
                reason: format!(
                    "invalid URL escape {:?}",
                    String::from_utf8_lossy(&bytes[pos..end])
                ),
            });
        }
    }

    Ok(url::form_urlencoded::parse(bytes)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

impl Runner {
    /// Submit `query` to the site and extract the result rows.
    ///
    /// Does not log in; call [`Runner::login`] first for private sites.
    pub async fn search(
        &self,
        browser: &mut dyn Browser,
        query: &Query,
    ) -> Result<Vec<ResultItem>, IndexerError> {
        let site = self.site().to_string();
        let timer = Instant::now();

        let result = self.run_search(browser, query).await;

        metrics::SEARCH_DURATION
            .with_label_values(&[site.as_str()])
            .observe(timer.elapsed().as_secs_f64());

        match &result {
            Ok(items) => {
                let outcome = if items.is_empty() { "empty" } else { "success" };
                metrics::SEARCHES_TOTAL
                    .with_label_values(&[site.as_str(), outcome])
                    .inc();
                info!(
                    site = %site,
                    results = items.len(),
                    elapsed_ms = timer.elapsed().as_millis() as u64,
                    "Query returned results"
                );
            }
            Err(e) => {
                metrics::SEARCHES_TOTAL
                    .with_label_values(&[site.as_str(), "failed"])
                    .inc();
                warn!(site = %site, error = %e, "Search failed");
            }
        }

        result
    }

    async fn run_search(
        &self,
        browser: &mut dyn Browser,
        query: &Query,
    ) -> Result<Vec<ResultItem>, IndexerError> {
        let search = &self.definition.search;
        let search_url = self.resolve_path(browser, &search.path)?;

        info!(
            site = %self.site(),
            mode = %query.mode,
            keywords = %query.keywords,
            "Searching indexer"
        );
        self.open_page(browser, &search_url).await?;

        let params = self.search_params(query)?;
        debug!(
            site = %self.site(),
            page = %search_url,
            params = ?params,
            "Submitting page with form params"
        );

        browser.open_form(&search_url, &params).await?;
        debug!(
            site = %self.site(),
            code = ?browser.status_code(),
            page = ?browser.url().map(Url::as_str),
            "Finished opening form"
        );

        let base = self.current_url(browser)?;
        let page = browser.page().ok_or(BrowserError::NoPage)?;
        self.extract_page(page, query, &base)
    }

    /// Resolve every search input against the query. Inputs named
    /// [`RAW_INPUT`] are parsed as query strings and merged pair by pair.
    pub fn search_params(&self, query: &Query) -> Result<Vec<(String, String)>, IndexerError> {
        let categories = &self.definition.capabilities.categories;
        let local_categories = categories.reverse_map(&query.categories);
        let ctx = TemplateContext::search(query, &local_categories);

        let mut params = Vec::new();
        for (name, template) in &self.definition.search.inputs {
            let resolved = resolve("search_inputs", template, &ctx)?;

            if name == RAW_INPUT {
                let parsed = parse_raw_input(&resolved)?;
                debug!(
                    site = %self.site(),
                    source = %template,
                    parsed = ?parsed,
                    "Processed $raw input"
                );
                params.extend(parsed);
            } else {
                params.push((name.clone(), resolved));
            }
        }

        Ok(params)
    }

    fn extract_page(
        &self,
        page: &Page,
        query: &Query,
        base: &Url,
    ) -> Result<Vec<ResultItem>, IndexerError> {
        let document = page.document();
        let ctx = self.filter_context();
        extract_items(&document, &self.definition.search, query, base, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::category::{TV_HD, TV_SD};
    use crate::config::MemoryConfig;
    use crate::testing::fixtures;

    fn runner() -> Runner {
        Runner::new(
            Arc::new(fixtures::private_definition()),
            Arc::new(MemoryConfig::new()),
        )
    }

    fn get<'p>(params: &'p [(String, String)], key: &str) -> Vec<&'p str> {
        params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_search_params_dedupes_local_categories() {
        let query = Query::new("search")
            .with_keywords("foo")
            .with_categories(vec![TV_SD, TV_HD]);
        let params = runner().search_params(&query).unwrap();

        assert_eq!(get(&params, "cat[]"), vec!["7"]);
        assert_eq!(get(&params, "search"), vec!["foo"]);
    }

    #[test]
    fn test_search_params_raw_input_merged() {
        let query = Query::new("search").with_keywords("foo");
        let params = runner().search_params(&query).unwrap();

        assert_eq!(get(&params, "q"), vec!["foo"]);
        assert_eq!(get(&params, "page"), vec!["2"]);
        assert!(get(&params, RAW_INPUT).is_empty());
    }

    #[test]
    fn test_search_params_raw_input_decodes_escapes() {
        let mut definition = fixtures::private_definition();
        definition
            .search
            .inputs
            .insert(RAW_INPUT.to_string(), "q=a%20b+c&x=%E2%9C%93".to_string());
        let runner = Runner::new(Arc::new(definition), Arc::new(MemoryConfig::new()));

        let params = runner.search_params(&Query::new("search")).unwrap();
        assert_eq!(get(&params, "q"), vec!["a b c"]);
        assert_eq!(get(&params, "x"), vec!["\u{2713}"]);
    }

    #[test]
    fn test_search_params_raw_input_bad_escape_fails() {
        for raw in ["q=%zz", "q=100%", "q=%4"] {
            let mut definition = fixtures::private_definition();
            definition
                .search
                .inputs
                .insert(RAW_INPUT.to_string(), raw.to_string());
            let runner = Runner::new(Arc::new(definition), Arc::new(MemoryConfig::new()));

            let err = runner.search_params(&Query::new("search")).unwrap_err();
            assert!(
                matches!(&err, IndexerError::RawInput { input, .. } if input == raw),
                "{raw}: {err:?}"
            );
            assert!(err.to_string().starts_with("Error parsing $raw input"));
        }
    }

    #[test]
    fn test_search_params_missing_field_fails() {
        let mut definition = fixtures::private_definition();
        definition
            .search
            .inputs
            .insert("imdb".to_string(), "{{ .Query.ImdbID }}".to_string());
        let runner = Runner::new(Arc::new(definition), Arc::new(MemoryConfig::new()));

        let err = runner.search_params(&Query::new("search")).unwrap_err();
        assert!(matches!(err, IndexerError::Template(_)));
    }
}
