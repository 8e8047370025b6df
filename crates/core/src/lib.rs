pub mod browser;
pub mod category;
pub mod config;
pub mod definition;
pub mod error;
pub mod extract;
pub mod filter;
pub mod indexer;
pub mod metrics;
pub mod query;
pub mod result;
pub mod template;
pub mod testing;

pub use browser::{Browser, BrowserError, Form, FormMethod, HttpBrowser, Page};
pub use category::{Category, CategoryMapping};
pub use config::{
    is_section_enabled, load_config, load_config_from_str, validate_config, AppConfig,
    BrowserConfig, ConfigError, ConfigStore, MemoryConfig,
};
pub use definition::{Definition, LoginBlock, SearchBlock, SelectorBlock};
pub use error::{DefinitionError, IndexerError};
pub use extract::ExtractionWarning;
pub use filter::{Filter, FilterArgs, FilterContext, FilterError};
pub use indexer::{Download, Info, LoginFlow, LoginState, Runner};
pub use query::{Query, QueryError};
pub use result::ResultItem;
pub use template::{Template, TemplateContext, TemplateError, TemplateValue};
