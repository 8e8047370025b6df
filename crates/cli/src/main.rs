//! trawler - run indexer definitions from the command line.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trawler_core::{load_config, validate_config, AppConfig, ConfigError};

#[derive(Parser)]
#[command(name = "trawler")]
#[command(about = "Scrape torrent indexers from declarative site definitions")]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "TRAWLER_CONFIG", default_value = "trawler.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => {
            info!("Loaded configuration from {:?}", cli.config);
            config
        }
        Err(ConfigError::FileNotFound(path)) => {
            warn!("No configuration at {}, using defaults", path);
            AppConfig::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load config from {:?}", cli.config))
        }
    };

    validate_config(&config).context("Configuration validation failed")?;

    commands::handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::Commands;

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "trawler",
            "--config",
            "/etc/trawler.toml",
            "search",
            "examplesite",
            "-q",
            "some show",
            "--cat",
            "5030,5040",
            "--limit",
            "10",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/trawler.toml"));
        match cli.command {
            Commands::Search {
                definition,
                query,
                cat,
                limit,
                mode,
            } => {
                assert_eq!(definition, "examplesite");
                assert_eq!(query.as_deref(), Some("some show"));
                assert_eq!(cat.as_deref(), Some("5030,5040"));
                assert_eq!(limit, Some(10));
                assert_eq!(mode, "search");
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_parse_requires_definition() {
        assert!(Cli::try_parse_from(["trawler", "caps"]).is_err());
    }
}
