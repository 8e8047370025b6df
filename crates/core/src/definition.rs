//! Site definitions.
//!
//! A definition is the declarative descriptor of one indexer site: where its
//! login and search pages live, which form inputs to send, how to find result
//! rows, and how to turn each row's markup into result fields. Definitions
//! are immutable once built and can be shared between concurrent operations.

use std::collections::BTreeMap;

use scraper::Selector;
use serde::Deserialize;
use url::Url;

use crate::category::CategoryMapping;
use crate::error::DefinitionError;
use crate::filter::Filter;

/// Output field names a definition may declare under `search.fields`.
pub const RESULT_FIELDS: &[&str] = &[
    "download",
    "details",
    "comments",
    "title",
    "description",
    "category",
    "size",
    "leechers",
    "seeders",
    "date",
];

/// Reserved search input whose resolved value is merged as a query string.
pub const RAW_INPUT: &str = "$raw";

fn default_language() -> String {
    "en-us".to_string()
}

fn default_form_selector() -> String {
    "form".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Definition {
    pub site: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub links: Vec<String>,
    #[serde(default)]
    pub login: Option<LoginBlock>,
    pub search: SearchBlock,
    #[serde(default)]
    pub capabilities: Capabilities,
}

impl Definition {
    /// Parse a definition from its JSON form.
    pub fn from_json(src: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(src)
    }

    /// The first declared link, parsed.
    pub fn base_url(&self) -> Result<Url, DefinitionError> {
        let link = self.links.first().ok_or(DefinitionError::NoLinks)?;
        Url::parse(link).map_err(|e| DefinitionError::InvalidLink {
            link: link.clone(),
            reason: e.to_string(),
        })
    }

    /// Check links, selectors and field names up front.
    ///
    /// Filters and category mappings are already checked while
    /// deserializing; this covers the parts that are plain strings.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.links.is_empty() {
            return Err(DefinitionError::NoLinks);
        }
        for link in &self.links {
            Url::parse(link).map_err(|e| DefinitionError::InvalidLink {
                link: link.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(login) = &self.login {
            compile_selector(&login.form_selector)?;
            for rule in &login.errors {
                if let Some(selector) = &rule.selector {
                    compile_selector(selector)?;
                }
                if let Some(message) = &rule.message {
                    message.validate()?;
                }
            }
        }

        compile_selector(&self.search.rows.selector)?;
        for (name, block) in &self.search.fields {
            if !RESULT_FIELDS.contains(&name.as_str()) {
                return Err(DefinitionError::UnknownField(name.clone()));
            }
            block.validate()?;
        }

        Ok(())
    }
}

/// How to authenticate against a private site.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginBlock {
    pub path: String,
    #[serde(default = "default_form_selector")]
    pub form_selector: String,
    /// Form input name to template.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Rules that, when matched on the post-submit page, mean login failed.
    #[serde(default, rename = "error")]
    pub errors: Vec<ErrorRule>,
}

/// A failed-login signal.
///
/// Matches when `selector` finds an element (whose text contains
/// `contains`, if given), or, without a selector, when the page text
/// contains `contains`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorRule {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
    /// Where to read a human-readable reason from.
    #[serde(default)]
    pub message: Option<SelectorBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchBlock {
    pub path: String,
    /// Request parameter name to template; see [`RAW_INPUT`].
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    pub rows: RowsBlock,
    pub fields: BTreeMap<String, SelectorBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RowsBlock {
    pub selector: String,
}

/// Where a value lives in the markup and how to clean it up.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectorBlock {
    /// CSS selector relative to the row; empty means the row itself.
    #[serde(default)]
    pub selector: String,
    /// Read this attribute of the first match instead of the text.
    #[serde(default)]
    pub attribute: Option<String>,
    /// Descendants matching this selector don't contribute text.
    #[serde(default)]
    pub remove: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl SelectorBlock {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        if !self.selector.is_empty() {
            compile_selector(&self.selector)?;
        }
        if let Some(remove) = &self.remove {
            compile_selector(remove)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Capabilities {
    #[serde(default, rename = "modes")]
    pub search_modes: Vec<SearchMode>,
    #[serde(default)]
    pub categories: CategoryMapping,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct SearchMode {
    pub key: String,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub supported_params: Vec<String>,
}

/// Compile a CSS selector, reporting failures as definition errors.
pub fn compile_selector(selector: &str) -> Result<Selector, DefinitionError> {
    Selector::parse(selector).map_err(|e| DefinitionError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}
