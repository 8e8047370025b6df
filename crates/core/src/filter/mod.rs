//! Filter pipeline.
//!
//! Filters are pure text transformations applied to the text selected from a
//! result row. Each filter kind carries its own typed arguments and is checked
//! when the definition is built, so a running search never meets an unknown
//! filter or a mistyped argument.

mod layout;
mod timeago;

pub use layout::{format_layout, parse_with_format, to_chrono_format};
pub use timeago::parse_time_ago;

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::category::CategoryMapping;
use crate::error::DefinitionError;

/// The one timestamp layout every filter emits and every consumer parses
/// (RFC 1123 with a numeric zone).
pub const CANONICAL_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Base used to interpret relative links handed to `querystring`.
static RELATIVE_BASE: Lazy<Url> = Lazy::new(|| Url::parse("http://localhost/").unwrap());

/// Format an instant in the canonical layout.
pub fn format_canonical<Tz: TimeZone>(instant: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.format(CANONICAL_FORMAT).to_string()
}

/// Parse a timestamp in the canonical layout.
pub fn parse_canonical(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, CANONICAL_FORMAT).ok()
}

/// Errors produced while applying a filter to a value.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Unable to parse {value:?} as a URL: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("Value {value:?} does not match date layout {layout:?}")]
    DateMismatch { value: String, layout: String },

    #[error("No matches found for pattern {pattern:?}")]
    NoMatch { pattern: String },

    #[error("Split index {index} out of range for {len} fragments")]
    SplitOutOfRange { index: i64, len: usize },

    #[error("Unable to parse relative time {input:?}: {reason}")]
    TimeAgo { input: String, reason: String },

    #[error("Unable to parse category id {0:?}")]
    InvalidCategory(String),

    #[error("No category mapping found for id {0}")]
    UnmappedCategory(i64),

    #[error("Requested attribute {0:?} doesn't exist")]
    MissingAttribute(String),
}

/// Per-operation state a filter may read.
///
/// Built fresh by every login/search so concurrent operations never share it.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    /// Site id, attached to every log line.
    pub site: &'a str,
    /// The site's category table, read by `mapcats`.
    pub categories: &'a CategoryMapping,
    /// The instant relative filters are evaluated against.
    pub now: DateTime<Utc>,
}

impl<'a> FilterContext<'a> {
    pub fn new(site: &'a str, categories: &'a CategoryMapping) -> Self {
        Self {
            site,
            categories,
            now: Utc::now(),
        }
    }

    /// Pin the reference instant (used by tests and replays).
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Filter arguments as written in a definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterArgs {
    #[default]
    None,
    Int(i64),
    Str(String),
    Pair(String, i64),
}

impl FilterArgs {
    fn kind(&self) -> &'static str {
        match self {
            FilterArgs::None => "no argument",
            FilterArgs::Int(_) => "an integer",
            FilterArgs::Str(_) => "a string",
            FilterArgs::Pair(_, _) => "a [string, int] pair",
        }
    }
}

/// A filter invocation as written in a definition.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFilter {
    pub name: String,
    #[serde(default)]
    pub args: FilterArgs,
}

/// A validated filter with typed arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawFilter")]
pub enum Filter {
    /// First value of a query parameter of a URL.
    QueryString { param: String },
    /// Re-emit a date written in `layout` in the canonical layout.
    DateParse { layout: String, format: String },
    /// First capture group (or whole match) of a pattern.
    Regexp { pattern: Regex },
    /// One fragment of a split; negative indexes count from the end.
    Split { separator: String, index: i64 },
    /// Relative time phrase to canonical timestamp.
    TimeAgo,
    /// Replace `Today`/`Yesterday` with dates written in `layout`.
    RelTime { layout: String },
    /// Site-local category id to canonical id.
    MapCats,
}

impl TryFrom<RawFilter> for Filter {
    type Error = DefinitionError;

    fn try_from(raw: RawFilter) -> Result<Self, Self::Error> {
        Filter::new(&raw.name, raw.args)
    }
}

impl Filter {
    /// Build a filter from its name and arguments.
    pub fn new(name: &str, args: FilterArgs) -> Result<Self, DefinitionError> {
        let mismatch = |expected: &'static str, args: &FilterArgs| {
            DefinitionError::InvalidFilterArgs {
                filter: name.to_string(),
                expected,
                found: args.kind(),
            }
        };

        match (name, args) {
            ("querystring", FilterArgs::Str(param)) => Ok(Filter::QueryString { param }),
            ("dateparse", FilterArgs::Str(layout)) => Ok(Filter::DateParse {
                format: to_chrono_format(&layout),
                layout,
            }),
            ("regexp", FilterArgs::Str(pattern)) => {
                let compiled =
                    Regex::new(&pattern).map_err(|e| DefinitionError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(Filter::Regexp { pattern: compiled })
            }
            ("split", FilterArgs::Pair(separator, index)) => {
                Ok(Filter::Split { separator, index })
            }
            ("timeago", FilterArgs::None) => Ok(Filter::TimeAgo),
            ("reltime", FilterArgs::Str(layout)) => Ok(Filter::RelTime { layout }),
            ("mapcats", FilterArgs::None) => Ok(Filter::MapCats),
            ("querystring" | "dateparse" | "regexp" | "reltime", args) => {
                Err(mismatch("a string", &args))
            }
            ("split", args) => Err(mismatch("a [string, int] pair", &args)),
            ("timeago" | "mapcats", args) => Err(mismatch("no argument", &args)),
            (other, _) => Err(DefinitionError::UnknownFilter(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filter::QueryString { .. } => "querystring",
            Filter::DateParse { .. } => "dateparse",
            Filter::Regexp { .. } => "regexp",
            Filter::Split { .. } => "split",
            Filter::TimeAgo => "timeago",
            Filter::RelTime { .. } => "reltime",
            Filter::MapCats => "mapcats",
        }
    }

    /// Apply the filter to `value`.
    pub fn apply(&self, value: &str, ctx: &FilterContext<'_>) -> Result<String, FilterError> {
        match self {
            Filter::QueryString { param } => query_string(param, value),
            Filter::DateParse { layout, format } => parse_with_format(value, format)
                .map(|dt| format_canonical(&dt))
                .ok_or_else(|| FilterError::DateMismatch {
                    value: value.to_string(),
                    layout: layout.clone(),
                }),
            Filter::Regexp { pattern } => regexp(pattern, value, ctx),
            Filter::Split { separator, index } => split(separator, *index, value),
            Filter::TimeAgo => parse_time_ago(value, ctx.now).map(|dt| format_canonical(&dt)),
            Filter::RelTime { layout } => Ok(rel_time(value, layout, ctx.now)),
            Filter::MapCats => map_category(value, ctx),
        }
    }
}

/// Run `value` through `filters` left to right.
pub fn apply_all(
    filters: &[Filter],
    value: &str,
    ctx: &FilterContext<'_>,
) -> Result<String, FilterError> {
    filters
        .iter()
        .try_fold(value.to_string(), |acc, filter| filter.apply(&acc, ctx))
}

fn query_string(param: &str, value: &str) -> Result<String, FilterError> {
    let parsed = match Url::parse(value) {
        Ok(u) => Ok(u),
        Err(url::ParseError::RelativeUrlWithoutBase) => RELATIVE_BASE.join(value),
        Err(e) => Err(e),
    }
    .map_err(|e| FilterError::InvalidUrl {
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    Ok(parsed
        .query_pairs()
        .find(|(k, _)| k == param)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default())
}

fn regexp(pattern: &Regex, value: &str, ctx: &FilterContext<'_>) -> Result<String, FilterError> {
    let captures = pattern.captures(value).ok_or_else(|| FilterError::NoMatch {
        pattern: pattern.as_str().to_string(),
    })?;

    debug!(
        site = ctx.site,
        pattern = pattern.as_str(),
        matched = ?captures.get(0).map(|m| m.as_str()),
        "Regex matched"
    );

    if captures.len() > 1 {
        return Ok(captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default());
    }

    Ok(captures
        .get(0)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default())
}

fn split(separator: &str, index: i64, value: &str) -> Result<String, FilterError> {
    let fragments: Vec<&str> = if separator.is_empty() {
        value
            .char_indices()
            .map(|(i, c)| &value[i..i + c.len_utf8()])
            .collect()
    } else {
        value.split(separator).collect()
    };

    let len = fragments.len();
    let pos = if index < 0 { len as i64 + index } else { index };

    usize::try_from(pos)
        .ok()
        .and_then(|p| fragments.get(p))
        .map(|f| f.to_string())
        .ok_or(FilterError::SplitOutOfRange { index, len })
}

fn rel_time(value: &str, layout: &str, now: DateTime<Utc>) -> String {
    let today = format_layout(&now, layout);
    let yesterday = format_layout(&(now - TimeDelta::days(1)), layout);
    value.replace("Today", &today).replace("Yesterday", &yesterday)
}

fn map_category(value: &str, ctx: &FilterContext<'_>) -> Result<String, FilterError> {
    let local: i64 = value
        .parse()
        .map_err(|_| FilterError::InvalidCategory(value.to_string()))?;

    ctx.categories
        .resolve(local)
        .map(|cat| cat.id.to_string())
        .ok_or(FilterError::UnmappedCategory(local))
}
