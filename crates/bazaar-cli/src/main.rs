//! bazaar - marketplace package client CLI

use std::time::Duration;

use anyhow::{Context, Result};
use bazaar_core::{Bazaar, BazaarConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bazaar_cli::cmd;
use bazaar_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config =
        BazaarConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(locale) = cli.locale() {
        config.locale = locale;
    }
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        locale = %config.locale,
        "loaded configuration"
    );

    let client = reqwest::Client::builder()
        .user_agent(bazaar_core::USER_AGENT)
        .timeout(Duration::from_secs(300))
        .build()
        .context("Failed to build HTTP client")?;
    let bazaar = Bazaar::new(config, client);
    let json = cli.json;

    match cli.command {
        Commands::List { kind } => cmd::list(&bazaar, kind.into(), json).await,
        Commands::Installed { kind } => cmd::installed(&bazaar, kind.into(), json).await,
        Commands::Outdated { kind } => cmd::outdated(&bazaar, kind.into(), json).await,
        Commands::Install {
            kind,
            reference,
            name,
        } => cmd::install(&bazaar, kind.into(), &reference, name.as_deref()).await,
        Commands::Upgrade { kind } => cmd::upgrade(&bazaar, kind.into()).await,
        Commands::Uninstall { kind, name } => cmd::uninstall(&bazaar, kind.into(), &name).await,
        Commands::Readme { kind, reference } => {
            cmd::readme(&bazaar, kind.into(), &reference).await
        }
    }
}
