use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub definitions: DefinitionsConfig,
    /// Per-site sections (credentials, `url` override, `enabled`).
    #[serde(default)]
    pub indexers: BTreeMap<String, HashMap<String, String>>,
}

/// Settings for the HTTP browsing session
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub send_referer: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            send_referer: false,
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Where definition documents live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefinitionsConfig {
    #[serde(default = "default_definitions_dir")]
    pub dir: PathBuf,
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            dir: default_definitions_dir(),
        }
    }
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from("definitions")
}
