//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::Serialize;
use tracing::info;

use trawler_core::{
    category::Category, definition::SearchMode, is_section_enabled, AppConfig, ConfigStore,
    Definition, HttpBrowser, Info, MemoryConfig, Query, Runner,
};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List definitions in the definitions directory
    List,
    /// Show a site's info and capabilities
    Caps {
        /// Definition file, or a site name in the definitions directory
        definition: String,
    },
    /// Log in and search a site
    Search {
        /// Definition file, or a site name in the definitions directory
        definition: String,
        /// Search keywords
        #[arg(short, long)]
        query: Option<String>,
        /// Comma separated canonical category ids
        #[arg(long)]
        cat: Option<String>,
        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,
        /// Search mode
        #[arg(short = 't', long, default_value = "search")]
        mode: String,
    },
    /// Run a test search in every mode the site supports
    Test {
        /// Definition file, or a site name in the definitions directory
        definition: String,
    },
    /// Log in and download a result link
    Download {
        /// Definition file, or a site name in the definitions directory
        definition: String,
        /// Link to fetch, absolute or relative to the site
        link: String,
        /// Where to write the file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct CapsOutput<'a> {
    info: Info,
    modes: &'a [SearchMode],
    categories: Vec<&'a Category>,
}

/// Handle the CLI command
pub async fn handle_command(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::List => list_definitions(&config.definitions.dir),
        Commands::Caps { definition } => {
            let runner = build_runner(&definition, config)?;
            let caps = runner.capabilities();
            print_json(&CapsOutput {
                info: runner.info(),
                modes: &caps.search_modes,
                categories: caps.categories.categories(),
            })
        }
        Commands::Search {
            definition,
            query,
            cat,
            limit,
            mode,
        } => {
            let mut params = vec![("t", mode.as_str())];
            if let Some(q) = query.as_deref() {
                params.push(("q", q));
            }
            if let Some(cat) = cat.as_deref() {
                params.push(("cat", cat));
            }
            let mut query = Query::from_params(params).context("Invalid query")?;
            query.limit = limit;

            let runner = build_runner(&definition, config)?;
            let mut browser = HttpBrowser::new(&config.browser)?;
            runner.login(&mut browser).await?;
            let items = runner.search(&mut browser, &query).await?;
            print_json(&items)
        }
        Commands::Test { definition } => {
            let runner = build_runner(&definition, config)?;
            let mut browser = HttpBrowser::new(&config.browser)?;
            runner.login(&mut browser).await?;
            runner.test(&mut browser).await?;
            info!(site = %runner.site(), "Definition test passed");
            Ok(())
        }
        Commands::Download {
            definition,
            link,
            output,
        } => {
            let runner = build_runner(&definition, config)?;
            let mut browser = HttpBrowser::new(&config.browser)?;
            let download = runner.download(&mut browser, &link).await?;
            tokio::fs::write(&output, &download.bytes)
                .await
                .with_context(|| format!("Failed to write {:?}", output))?;
            info!(bytes = download.bytes.len(), path = ?output, "Saved download");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_definitions(dir: &Path) -> Result<()> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read definitions directory {:?}", dir))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            (path.extension()? == "json")
                .then(|| path.file_stem()?.to_str().map(str::to_string))
                .flatten()
        })
        .collect();
    names.sort();

    for name in names {
        println!("{name}");
    }
    Ok(())
}

/// A definition argument is a file path, or a site name looked up as
/// `<definitions.dir>/<name>.json`.
fn definition_path(arg: &str, config: &AppConfig) -> PathBuf {
    let direct = PathBuf::from(arg);
    if direct.is_file() {
        return direct;
    }
    config.definitions.dir.join(format!("{arg}.json"))
}

fn load_definition(arg: &str, config: &AppConfig) -> Result<Definition> {
    let path = definition_path(arg, config);
    let src = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read definition {:?}", path))?;
    let definition = Definition::from_json(&src)
        .with_context(|| format!("Failed to parse definition {:?}", path))?;
    definition
        .validate()
        .with_context(|| format!("Invalid definition {:?}", path))?;
    Ok(definition)
}

fn build_runner(arg: &str, config: &AppConfig) -> Result<Runner> {
    let definition = load_definition(arg, config)?;
    let store = MemoryConfig::from(config);

    if !is_section_enabled(&store, &definition.site) {
        bail!("Indexer {} is disabled in configuration", definition.site);
    }

    let store: Arc<dyn ConfigStore> = Arc::new(store);
    Ok(Runner::new(Arc::new(definition), store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const DEFINITION: &str = r#"{
        "site": "public",
        "name": "Public",
        "links": ["http://public.example/"],
        "search": {
            "path": "/search",
            "rows": {"selector": "li"},
            "fields": {"title": {}}
        }
    }"#;

    fn config_with_dir(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.definitions.dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_definition_resolved_by_name() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("public.json")).unwrap();
        file.write_all(DEFINITION.as_bytes()).unwrap();

        let config = config_with_dir(dir.path());
        let runner = build_runner("public", &config).unwrap();
        assert_eq!(runner.site(), "public");
    }

    #[test]
    fn test_disabled_indexer_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("public.json"), DEFINITION).unwrap();

        let mut config = config_with_dir(dir.path());
        config.indexers.insert(
            "public".to_string(),
            [("enabled".to_string(), "false".to_string())].into(),
        );

        assert!(build_runner("public", &config).is_err());
    }

    #[test]
    fn test_missing_definition() {
        let dir = TempDir::new().unwrap();
        let config = config_with_dir(dir.path());
        assert!(load_definition("nowhere", &config).is_err());
    }
}
