use thiserror::Error;

use crate::browser::BrowserError;
use crate::config::ConfigError;
use crate::filter::FilterError;
use crate::query::QueryError;
use crate::template::TemplateError;

/// A malformed or unsupported construct in a site definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Unknown filter {0:?}")]
    UnknownFilter(String),

    #[error("Filter {filter} expects {expected}, found {found}")]
    InvalidFilterArgs {
        filter: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unknown category {0:?}")]
    UnknownCategory(String),

    #[error("Unknown field {0:?}")]
    UnknownField(String),

    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Definition declares no links")]
    NoLinks,

    #[error("Invalid link {link:?}: {reason}")]
    InvalidLink { link: String, reason: String },
}

/// Everything a login, search, or download can fail with.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transport(#[from] BrowserError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Error parsing $raw input {input:?}: {reason}")]
    RawInput { input: String, reason: String },

    #[error("Self-test failed: {0}")]
    Test(String),

    #[error("Search returned no results")]
    NoResults,
}
