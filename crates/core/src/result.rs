//! Normalized search results.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Minimum share ratio every result advertises.
pub const DEFAULT_MINIMUM_RATIO: f64 = 1.0;

/// Minimum seed time every result advertises.
pub const DEFAULT_MINIMUM_SEED_TIME: Duration = Duration::from_secs(48 * 60 * 60);

/// One normalized row of a site's search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub site: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Download link.
    pub link: String,
    /// Details page link, doubling as the item's unique id.
    pub guid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comments: String,
    /// Canonical category id.
    pub category: i64,
    /// Size in bytes.
    pub size: u64,
    pub seeders: i64,
    /// Seeders plus leechers.
    pub peers: i64,
    #[serde(default, with = "canonical_date")]
    pub publish_date: Option<DateTime<FixedOffset>>,
    pub minimum_ratio: f64,
    #[serde(with = "seconds")]
    pub minimum_seed_time: Duration,
}

impl ResultItem {
    /// An empty item for `site` carrying the default seeding policy.
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            title: String::new(),
            description: String::new(),
            link: String::new(),
            guid: String::new(),
            comments: String::new(),
            category: 0,
            size: 0,
            seeders: 0,
            peers: 0,
            publish_date: None,
            minimum_ratio: DEFAULT_MINIMUM_RATIO,
            minimum_seed_time: DEFAULT_MINIMUM_SEED_TIME,
        }
    }
}

/// Publish dates travel in the canonical timestamp layout.
mod canonical_date {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::filter::{format_canonical, parse_canonical};

    pub fn serialize<S>(
        value: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&format_canonical(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            parse_canonical(&s)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid publish date {s:?}")))
        })
        .transpose()
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
