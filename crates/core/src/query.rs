//! Search queries as received from the metasearch protocol layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while parsing query parameters.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid category id: {0}")]
    InvalidCategory(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),
}

/// A search request against one site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Protocol mode key (`search`, `tv-search`, `caps`, ...).
    pub mode: String,
    /// Free-text keywords; empty for browse-style requests.
    #[serde(default)]
    pub keywords: String,
    /// Canonical category ids to restrict results to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<i64>,
    /// Maximum results to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
}

impl Query {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            ..Default::default()
        }
    }

    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = keywords.into();
        self
    }

    pub fn with_categories(mut self, categories: Vec<i64>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parse protocol parameters (`t`, `q`, `cat`, `limit`, `offset`,
    /// `season`, `ep`, `imdbid`). Unknown keys are ignored.
    pub fn from_params<'a, I>(params: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut query = Query::new("search");

        for (key, value) in params {
            match key {
                "t" => query.mode = value.to_string(),
                "q" => query.keywords = value.to_string(),
                "cat" => {
                    query.categories = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| {
                            s.parse::<i64>()
                                .map_err(|_| QueryError::InvalidCategory(s.to_string()))
                        })
                        .collect::<Result<_, _>>()?;
                }
                "limit" => {
                    query.limit = Some(
                        value
                            .parse()
                            .map_err(|_| QueryError::InvalidLimit(value.to_string()))?,
                    );
                }
                "offset" => {
                    query.offset = Some(
                        value
                            .parse()
                            .map_err(|_| QueryError::InvalidOffset(value.to_string()))?,
                    );
                }
                "season" => query.season = Some(value.to_string()),
                "ep" => query.episode = Some(value.to_string()),
                "imdbid" => query.imdb_id = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_params() {
        let query = Query::from_params([
            ("t", "tv-search"),
            ("q", "some show"),
            ("cat", "5030,5040"),
            ("limit", "20"),
            ("season", "2"),
            ("ep", "5"),
            ("apikey", "ignored"),
        ])
        .unwrap();

        assert_eq!(query.mode, "tv-search");
        assert_eq!(query.keywords, "some show");
        assert_eq!(query.categories, vec![5030, 5040]);
        assert_eq!(query.limit, Some(20));
        assert_eq!(query.season.as_deref(), Some("2"));
        assert_eq!(query.episode.as_deref(), Some("5"));
        assert!(query.imdb_id.is_none());
    }

    #[test]
    fn test_from_params_defaults() {
        let query = Query::from_params(Vec::<(&str, &str)>::new()).unwrap();
        assert_eq!(query.mode, "search");
        assert!(query.keywords.is_empty());
        assert!(query.categories.is_empty());
        assert!(query.limit.is_none());
    }

    #[test]
    fn test_from_params_bad_values() {
        assert!(matches!(
            Query::from_params([("cat", "5030,tv")]),
            Err(QueryError::InvalidCategory(c)) if c == "tv"
        ));
        assert!(matches!(
            Query::from_params([("limit", "-1")]),
            Err(QueryError::InvalidLimit(_))
        ));
    }

    #[test]
    fn test_builder() {
        let query = Query::new("search")
            .with_keywords("ubuntu")
            .with_categories(vec![4000])
            .with_limit(5);

        assert_eq!(query.keywords, "ubuntu");
        assert_eq!(query.categories, vec![4000]);
        assert_eq!(query.limit, Some(5));
    }
}
