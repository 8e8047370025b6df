//! Per-site key/value settings.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{AppConfig, ConfigError};

/// Key/value settings grouped by section (one section per site).
pub trait ConfigStore: Send + Sync {
    fn get(&self, section: &str, key: &str) -> Result<Option<String>, ConfigError>;

    fn set(&self, section: &str, key: &str, value: &str) -> Result<(), ConfigError>;

    fn sections(&self) -> Result<Vec<String>, ConfigError>;

    /// All keys of a section; a missing section is empty.
    fn section(&self, section: &str) -> Result<HashMap<String, String>, ConfigError>;
}

/// Whether a site is enabled: true unless its `enabled` key says otherwise.
pub fn is_section_enabled(store: &dyn ConfigStore, section: &str) -> bool {
    match store.get(section, "enabled") {
        Ok(Some(value)) => value == "true" || value == "ok",
        Ok(None) => true,
        Err(_) => false,
    }
}

/// In-memory [`ConfigStore`], usually seeded from the `[indexers]` table.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    sections: RwLock<BTreeMap<String, HashMap<String, String>>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section<I, K, V>(self, section: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if let Ok(mut sections) = self.sections.write() {
            let entry = sections.entry(section.to_string()).or_default();
            entry.extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        self
    }
}

impl From<&AppConfig> for MemoryConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            sections: RwLock::new(config.indexers.clone()),
        }
    }
}

fn poisoned<T>(_: T) -> ConfigError {
    ConfigError::Unavailable("lock poisoned".to_string())
}

impl ConfigStore for MemoryConfig {
    fn get(&self, section: &str, key: &str) -> Result<Option<String>, ConfigError> {
        let sections = self.sections.read().map_err(poisoned)?;
        Ok(sections.get(section).and_then(|s| s.get(key)).cloned())
    }

    fn set(&self, section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut sections = self.sections.write().map_err(poisoned)?;
        sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn sections(&self) -> Result<Vec<String>, ConfigError> {
        let sections = self.sections.read().map_err(poisoned)?;
        Ok(sections.keys().cloned().collect())
    }

    fn section(&self, section: &str) -> Result<HashMap<String, String>, ConfigError> {
        let sections = self.sections.read().map_err(poisoned)?;
        Ok(sections.get(section).cloned().unwrap_or_default())
    }
}
