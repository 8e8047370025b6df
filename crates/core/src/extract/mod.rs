//! Turning result rows into [`ResultItem`]s.
//!
//! Every declared field is read from the row with its [`SelectorBlock`] and
//! run through its filters, then the resulting strings are coerced onto the
//! item. Malformed optional values become [`ExtractionWarning`]s and are
//! skipped; unknown field names abort the search.

mod size;

pub use size::parse_size;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

use crate::definition::{compile_selector, SearchBlock, SelectorBlock};
use crate::error::{DefinitionError, IndexerError};
use crate::filter::{apply_all, parse_canonical, FilterContext, FilterError};
use crate::metrics;
use crate::query::Query;
use crate::result::ResultItem;

/// A field value that could not be coerced and was left unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionWarning {
    /// 1-based row number.
    pub row: usize,
    pub field: String,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Search result row #{} has malformed {} {:?}: {}",
            self.row, self.field, self.value, self.reason
        )
    }
}

/// Read a block's raw value from `row`, before filters.
///
/// Text is the concatenated text of every match, trimmed. With an
/// attribute, the first match's attribute is used instead.
pub fn select_value(row: ElementRef<'_>, block: &SelectorBlock) -> Result<String, IndexerError> {
    let matches: Vec<ElementRef<'_>> = if block.selector.is_empty() {
        vec![row]
    } else {
        let selector = compile_selector(&block.selector)?;
        row.select(&selector).collect()
    };

    if let Some(attribute) = &block.attribute {
        return matches
            .first()
            .and_then(|el| el.value().attr(attribute))
            .map(str::to_string)
            .ok_or_else(|| FilterError::MissingAttribute(attribute.clone()).into());
    }

    let removed: HashSet<_> = match &block.remove {
        Some(remove) => {
            let selector = compile_selector(remove)?;
            matches
                .iter()
                .flat_map(|el| el.select(&selector).map(|r| r.id()))
                .collect()
        }
        None => HashSet::new(),
    };

    let mut text = String::new();
    for el in &matches {
        for node in el.descendants() {
            let Some(chunk) = node.value().as_text() else {
                continue;
            };
            let hidden = node
                .ancestors()
                .take_while(|a| a.id() != el.id())
                .any(|a| removed.contains(&a.id()));
            if !hidden {
                text.push_str(chunk);
            }
        }
    }

    Ok(text.trim().to_string())
}

/// Read a block's value from `row` and run it through the block's filters.
pub fn block_value(
    row: ElementRef<'_>,
    block: &SelectorBlock,
    ctx: &FilterContext<'_>,
) -> Result<String, IndexerError> {
    let raw = select_value(row, block)?;
    Ok(apply_all(&block.filters, &raw, ctx)?)
}

/// Extract every declared field of one row as `field -> value`.
pub fn extract_row(
    row: ElementRef<'_>,
    fields: &BTreeMap<String, SelectorBlock>,
    row_no: usize,
    ctx: &FilterContext<'_>,
) -> Result<BTreeMap<String, String>, IndexerError> {
    let mut values = BTreeMap::new();
    for (field, block) in fields {
        let value = block_value(row, block, ctx)?;
        debug!(site = ctx.site, row = row_no, field = %field, output = %value, "Processed field");
        values.insert(field.clone(), value);
    }
    Ok(values)
}

/// Coerce extracted strings onto a fresh [`ResultItem`].
///
/// URL fields resolve against `base`. Returns the item together with the
/// warnings for values that were skipped.
pub fn build_item(
    site: &str,
    row_no: usize,
    values: &BTreeMap<String, String>,
    base: &Url,
) -> Result<(ResultItem, Vec<ExtractionWarning>), DefinitionError> {
    let mut item = ResultItem::new(site);
    let mut warnings = Vec::new();

    let mut skip = |field: &str, value: &str, reason: String| {
        warnings.push(ExtractionWarning {
            row: row_no,
            field: field.to_string(),
            value: value.to_string(),
            reason,
        });
    };

    for (field, value) in values {
        match field.as_str() {
            "download" | "details" | "comments" => match base.join(value) {
                Ok(url) => {
                    let url = url.to_string();
                    match field.as_str() {
                        "download" => item.link = url,
                        "details" => item.guid = url,
                        _ => item.comments = url,
                    }
                }
                Err(e) => skip(field, value, e.to_string()),
            },
            "title" => item.title = value.clone(),
            "description" => item.description = value.clone(),
            "category" => match value.parse::<i64>() {
                Ok(id) => item.category = id,
                Err(e) => skip(field, value, e.to_string()),
            },
            "size" => match parse_size(value) {
                Some(bytes) => item.size = bytes,
                None => skip(field, value, "unrecognised byte size".to_string()),
            },
            "leechers" => match value.parse::<i64>() {
                Ok(n) => item.peers = item.peers.saturating_add(n),
                Err(e) => skip(field, value, e.to_string()),
            },
            "seeders" => match value.parse::<i64>() {
                Ok(n) => {
                    item.seeders = n;
                    item.peers = item.peers.saturating_add(n);
                }
                Err(e) => skip(field, value, e.to_string()),
            },
            "date" => match parse_canonical(value) {
                Some(date) => item.publish_date = Some(date),
                None => skip(field, value, "not a canonical timestamp".to_string()),
            },
            other => return Err(DefinitionError::UnknownField(other.to_string())),
        }
    }

    Ok((item, warnings))
}

/// Extract result items from a search results document.
///
/// Rows are processed in document order. The first row with an empty title
/// means the page has no results and yields an empty list. When `query`
/// names categories, rows outside them are dropped; `query.limit` bounds
/// the rows emitted after that filtering.
pub fn extract_items(
    document: &Html,
    search: &SearchBlock,
    query: &Query,
    base: &Url,
    ctx: &FilterContext<'_>,
) -> Result<Vec<ResultItem>, IndexerError> {
    let rows_selector = compile_selector(&search.rows.selector)?;
    let rows: Vec<ElementRef<'_>> = document.select(&rows_selector).collect();

    debug!(site = ctx.site, rows = rows.len(), selector = %search.rows.selector, "Found rows");

    let mut items = Vec::new();
    for (idx, row) in rows.into_iter().enumerate() {
        if query.limit.is_some_and(|limit| items.len() >= limit) {
            break;
        }
        let row_no = idx + 1;

        let values = extract_row(row, &search.fields, row_no, ctx)?;
        let (item, warnings) = build_item(ctx.site, row_no, &values, base)?;

        for warning in &warnings {
            warn!(site = ctx.site, row = warning.row, field = %warning.field, "{}", warning);
            metrics::EXTRACTION_WARNINGS
                .with_label_values(&[ctx.site, warning.field.as_str()])
                .inc();
        }

        if item.title.is_empty() {
            debug!(site = ctx.site, row = row_no, "Row has empty title, treating page as empty");
            return Ok(Vec::new());
        }

        if !query.categories.is_empty() && !query.categories.contains(&item.category) {
            debug!(
                site = ctx.site,
                row = row_no,
                category = item.category,
                "Skipping row with non-matching category"
            );
            metrics::ROWS_TOTAL
                .with_label_values(&[ctx.site, "filtered"])
                .inc();
            continue;
        }

        metrics::ROWS_TOTAL
            .with_label_values(&[ctx.site, "emitted"])
            .inc();
        items.push(item);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategoryMapping, MOVIES_HD, TV_HD};
    use crate::definition::RowsBlock;
    use crate::filter::{Filter, FilterArgs};
    use scraper::Selector;

    const RESULTS: &str = r#"
        <table id="results">
          <tr class="row">
            <td class="name"><a href="/details.php?id=1">Show.S01E01.720p</a></td>
            <td class="cat"><a href="/browse.php?cat=7">TV</a></td>
            <td class="dl"><a href="/download.php?id=1">dl</a></td>
            <td class="size">1.2 GB<span class="hint"> (approx)</span></td>
            <td class="seed">10</td>
            <td class="leech">3</td>
            <td class="added">Sat, 12 Mar 2016 08:05:00 +0000</td>
          </tr>
          <tr class="row">
            <td class="name"><a href="/details.php?id=2">Movie.2015.1080p</a></td>
            <td class="cat"><a href="/browse.php?cat=12">Movies</a></td>
            <td class="dl"><a href="/download.php?id=2">dl</a></td>
            <td class="size">huge</td>
            <td class="seed">5</td>
            <td class="leech">x</td>
            <td class="added">yesterday</td>
          </tr>
          <tr class="row">
            <td class="name"><a href="/details.php?id=3">Show.S01E02.720p</a></td>
            <td class="cat"><a href="/browse.php?cat=7">TV</a></td>
            <td class="dl"><a href="/download.php?id=3">dl</a></td>
            <td class="size">700 MiB</td>
            <td class="seed">1</td>
            <td class="leech">0</td>
            <td class="added">Sun, 13 Mar 2016 08:05:00 +0000</td>
          </tr>
        </table>
    "#;

    fn filter(name: &str, args: FilterArgs) -> Filter {
        Filter::new(name, args).unwrap()
    }

    fn search_block() -> SearchBlock {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), SelectorBlock::new("td.name a"));
        fields.insert(
            "details".to_string(),
            SelectorBlock::new("td.name a").with_attribute("href"),
        );
        fields.insert(
            "download".to_string(),
            SelectorBlock::new("td.dl a").with_attribute("href"),
        );
        fields.insert(
            "category".to_string(),
            SelectorBlock::new("td.cat a")
                .with_attribute("href")
                .with_filter(filter("querystring", FilterArgs::Str("cat".to_string())))
                .with_filter(filter("mapcats", FilterArgs::None)),
        );
        fields.insert(
            "size".to_string(),
            SelectorBlock {
                remove: Some("span".to_string()),
                ..SelectorBlock::new("td.size")
            },
        );
        fields.insert("seeders".to_string(), SelectorBlock::new("td.seed"));
        fields.insert("leechers".to_string(), SelectorBlock::new("td.leech"));
        fields.insert("date".to_string(), SelectorBlock::new("td.added"));

        SearchBlock {
            path: "/browse.php".to_string(),
            inputs: BTreeMap::new(),
            rows: RowsBlock {
                selector: "tr.row".to_string(),
            },
            fields,
        }
    }

    fn mapping() -> CategoryMapping {
        CategoryMapping::from_pairs([(TV_HD, 7), (MOVIES_HD, 12)])
    }

    fn base() -> Url {
        Url::parse("https://tracker.example/browse.php").unwrap()
    }

    fn run(html: &str, query: &Query) -> Result<Vec<ResultItem>, IndexerError> {
        let document = Html::parse_document(html);
        let mapping = mapping();
        let ctx = FilterContext::new("testsite", &mapping);
        extract_items(&document, &search_block(), query, &base(), &ctx)
    }

    #[test]
    fn test_extract_all_rows() {
        let items = run(RESULTS, &Query::new("search")).unwrap();
        assert_eq!(items.len(), 3);

        let first = &items[0];
        assert_eq!(first.site, "testsite");
        assert_eq!(first.title, "Show.S01E01.720p");
        assert_eq!(first.guid, "https://tracker.example/details.php?id=1");
        assert_eq!(first.link, "https://tracker.example/download.php?id=1");
        assert_eq!(first.category, TV_HD);
        assert_eq!(first.size, 1_200_000_000);
        assert_eq!(first.seeders, 10);
        assert_eq!(first.peers, 13);
        assert_eq!(first.minimum_ratio, 1.0);
        assert!(first.publish_date.is_some());
    }

    #[test]
    fn test_malformed_optional_fields_are_skipped() {
        let items = run(RESULTS, &Query::new("search")).unwrap();
        let second = &items[1];

        assert_eq!(second.title, "Movie.2015.1080p");
        assert_eq!(second.size, 0);
        assert_eq!(second.seeders, 5);
        assert_eq!(second.peers, 5);
        assert!(second.publish_date.is_none());
        assert_eq!(second.category, MOVIES_HD);
    }

    #[test]
    fn test_empty_title_returns_no_items() {
        let html = RESULTS.replace("Movie.2015.1080p", "");
        let items = run(&html, &Query::new("search")).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_category_filter() {
        let query = Query::new("search").with_categories(vec![MOVIES_HD]);
        let items = run(RESULTS, &query).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Movie.2015.1080p");
    }

    #[test]
    fn test_limit_applies_after_category_filter() {
        let query = Query::new("search").with_categories(vec![TV_HD]).with_limit(2);
        let items = run(RESULTS, &query).unwrap();

        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Show.S01E01.720p", "Show.S01E02.720p"]);

        let limited = run(RESULTS, &Query::new("search").with_limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_filter_failure_aborts() {
        let html = RESULTS.replace("cat=12", "cat=99");
        let err = run(&html, &Query::new("search")).unwrap_err();
        assert!(matches!(
            err,
            IndexerError::Filter(FilterError::UnmappedCategory(99))
        ));
    }

    #[test]
    fn test_missing_attribute() {
        let document = Html::parse_document(r#"<table><tr><td><a>x</a></td></tr></table>"#);
        let row_sel = Selector::parse("tr").unwrap();
        let row = document.select(&row_sel).next().unwrap();

        let err = select_value(row, &SelectorBlock::new("a").with_attribute("href")).unwrap_err();
        assert!(matches!(
            err,
            IndexerError::Filter(FilterError::MissingAttribute(attr)) if attr == "href"
        ));
    }

    #[test]
    fn test_select_value_concatenates_and_trims() {
        let document = Html::parse_document(
            r#"<ul><li> <b>one</b> <i>skip</i><b>two</b> </li></ul>"#,
        );
        let row_sel = Selector::parse("li").unwrap();
        let row = document.select(&row_sel).next().unwrap();

        assert_eq!(select_value(row, &SelectorBlock::new("b")).unwrap(), "onetwo");

        let whole = SelectorBlock {
            remove: Some("i".to_string()),
            ..SelectorBlock::default()
        };
        assert_eq!(select_value(row, &whole).unwrap(), "one two");
    }

    #[test]
    fn test_build_item_unknown_field() {
        let mut values = BTreeMap::new();
        values.insert("title".to_string(), "x".to_string());
        values.insert("uploader".to_string(), "bob".to_string());

        let err = build_item("site", 1, &values, &base()).unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownField(f) if f == "uploader"));
    }

    #[test]
    fn test_build_item_bad_url_is_warning() {
        let mut values = BTreeMap::new();
        values.insert("title".to_string(), "x".to_string());
        values.insert("download".to_string(), "http://[broken".to_string());
        values.insert("details".to_string(), "/details/1".to_string());

        let (item, warnings) = build_item("site", 4, &values, &base()).unwrap();
        assert!(item.link.is_empty());
        assert_eq!(item.guid, "https://tracker.example/details/1");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "download");
        assert_eq!(warnings[0].row, 4);
    }

    #[test]
    fn test_build_item_peer_total_saturates() {
        let mut values = BTreeMap::new();
        values.insert("title".to_string(), "x".to_string());
        values.insert("seeders".to_string(), i64::MAX.to_string());
        values.insert("leechers".to_string(), "1".to_string());

        let (item, warnings) = build_item("site", 1, &values, &base()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(item.seeders, i64::MAX);
        assert_eq!(item.peers, i64::MAX);
    }
}
