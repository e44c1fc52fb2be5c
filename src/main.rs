//! Folia - a rule-driven static site generator.

mod aggregate;
mod cli;
mod collect;
mod config;
mod generator;
mod header;
mod logger;
mod model;
mod pattern;
mod render;
mod sort;
mod stale;
mod style;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use collect::collect;
use config::SiteConfig;
use render::render_all;
use std::path::Path;
use style::StyleCache;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = cli.root.as_deref().unwrap_or(Path::new("."));
    let config_path = root.join(&cli.config);
    let config = SiteConfig::from_path(&config_path)?;
    let mut site = config.into_site(root, cli.output.as_deref())?;

    collect(&mut site)?;

    let mut cache = StyleCache::default();
    render_all(&site, &mut cache)?;

    Ok(())
}
