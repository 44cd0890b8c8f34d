//! Blogsmith - an incremental static blog generator.

mod cli;
mod config;
mod content;
mod corpus;
mod logger;
mod reload;
mod render;
mod serve;
mod site;
mod watch;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use render::{BuiltinTemplates, Renderers};
use serve::serve_site;
use site::SiteBuilder;
use std::{path::Path, sync::Arc};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let builder = SiteBuilder::new(
        &config,
        Arc::new(Renderers::with_defaults()),
        Arc::new(BuiltinTemplates),
    )?;

    match &cli.command {
        Commands::Build { clean } => {
            if *clean {
                builder.clean()?;
                log!("build"; "cleaned {}", config.build.output.display());
            }
            let report = builder.build()?;
            if !report.wrote_anything() {
                log!("build"; "{} is up to date", config.build.output.display());
            }
            Ok(())
        }
        Commands::Serve { .. } => {
            builder.build()?;
            serve_site(builder)
        }
    }
}

/// Load and validate configuration from CLI arguments.
///
/// A missing config file is not an error; defaults describe a usable site.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = SiteConfig::load_or_default(&config_path)?;
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}
